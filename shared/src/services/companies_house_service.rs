use serde::Deserialize;

use crate::{CompanyAddress, CompanyProfile, TransferError, TransferResult};

const COMPANIES_HOUSE_URL: &str = "https://api.company-information.service.gov.uk";

/// Canonical 8-character company number, e.g. `1234567` -> `01234567`
pub fn normalize_company_number(raw: &str) -> TransferResult<String> {
    let trimmed = raw.trim().to_uppercase();
    let number = if !trimmed.is_empty() && trimmed.len() < 8 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        format!("{:0>8}", trimmed)
    } else {
        trimmed
    };

    let valid = number.is_ascii() && number.len() == 8 && {
        let (prefix, rest) = number.split_at(2);
        rest.chars().all(|c| c.is_ascii_digit())
            && (prefix.chars().all(|c| c.is_ascii_digit())
                || prefix.chars().all(|c| c.is_ascii_uppercase()))
    };

    if !valid {
        return Err(TransferError::ValidationError(format!(
            "Invalid company number: {}",
            raw.trim()
        )));
    }

    Ok(number)
}

#[derive(Debug, Deserialize)]
struct CompanyResponse {
    company_number: String,
    company_name: String,
    company_status: Option<String>,
    #[serde(rename = "type")]
    company_type: Option<String>,
    date_of_creation: Option<String>,
    registered_office_address: Option<AddressResponse>,
}

#[derive(Debug, Deserialize)]
struct AddressResponse {
    address_line_1: Option<String>,
    address_line_2: Option<String>,
    locality: Option<String>,
    region: Option<String>,
    postal_code: Option<String>,
    country: Option<String>,
}

pub fn parse_company_profile(body: &str) -> TransferResult<CompanyProfile> {
    let company: CompanyResponse = serde_json::from_str(body).map_err(|e| {
        TransferError::ExternalServiceError(format!("Bad Companies House body: {}", e))
    })?;

    Ok(CompanyProfile {
        company_number: company.company_number,
        company_name: company.company_name,
        company_status: company.company_status,
        company_type: company.company_type,
        date_of_creation: company.date_of_creation,
        registered_office_address: company.registered_office_address.map(|a| CompanyAddress {
            address_line_1: a.address_line_1,
            address_line_2: a.address_line_2,
            locality: a.locality,
            region: a.region,
            postal_code: a.postal_code,
            country: a.country,
        }),
    })
}

pub struct CompaniesHouseService {
    http: reqwest::Client,
    api_key: String,
}

impl CompaniesHouseService {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
        }
    }

    pub fn from_env() -> TransferResult<Self> {
        let api_key = std::env::var("COMPANIES_HOUSE_API_KEY").map_err(|_| {
            TransferError::ConfigurationError("COMPANIES_HOUSE_API_KEY not set".to_string())
        })?;
        Ok(Self::new(api_key))
    }

    pub async fn get_company(&self, raw_number: &str) -> TransferResult<CompanyProfile> {
        let number = normalize_company_number(raw_number)?;

        // The API key is the basic-auth username with an empty password
        let response = self
            .http
            .get(format!("{}/company/{}", COMPANIES_HOUSE_URL, number))
            .basic_auth(&self.api_key, Some(""))
            .send()
            .await?;

        match response.status().as_u16() {
            200 => {}
            404 => return Err(TransferError::NotFound(format!("Company {}", number))),
            status => {
                return Err(TransferError::ExternalServiceError(format!(
                    "Companies House HTTP {}",
                    status
                )))
            }
        }

        let profile = parse_company_profile(&response.text().await?)?;
        tracing::info!("Looked up company {}", profile.company_number);
        Ok(profile)
    }
}

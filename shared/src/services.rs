pub mod booking_service;
pub mod comment_service;
pub mod companies_house_service;
pub mod email_service;
pub mod items;
pub mod maps_service;
pub mod queue_service;
pub mod quote_service;
pub mod storage_service;
pub mod vehicle_service;

pub use booking_service::*;
pub use comment_service::*;
pub use companies_house_service::*;
pub use email_service::*;
pub use maps_service::*;
pub use queue_service::*;
pub use quote_service::*;
pub use storage_service::*;
pub use vehicle_service::*;

/// Offline SDK clients; they are never sent a request in unit tests
#[cfg(test)]
pub(crate) mod test_support {
    pub fn dynamo_client() -> aws_sdk_dynamodb::Client {
        let config = aws_sdk_dynamodb::Config::builder()
            .behavior_version(aws_sdk_dynamodb::config::BehaviorVersion::latest())
            .region(aws_sdk_dynamodb::config::Region::new("eu-west-2"))
            .credentials_provider(aws_sdk_dynamodb::config::SharedCredentialsProvider::new(
                aws_sdk_dynamodb::config::Credentials::new("test", "test", None, None, "test"),
            ))
            .build();
        aws_sdk_dynamodb::Client::from_conf(config)
    }

    pub fn ses_client() -> aws_sdk_ses::Client {
        let config = aws_sdk_ses::Config::builder()
            .behavior_version(aws_sdk_ses::config::BehaviorVersion::latest())
            .region(aws_sdk_ses::config::Region::new("eu-west-2"))
            .credentials_provider(aws_sdk_ses::config::SharedCredentialsProvider::new(
                aws_sdk_ses::config::Credentials::new("test", "test", None, None, "test"),
            ))
            .build();
        aws_sdk_ses::Client::from_conf(config)
    }

    pub fn s3_client() -> aws_sdk_s3::Client {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new("eu-west-2"))
            .credentials_provider(aws_sdk_s3::config::SharedCredentialsProvider::new(
                aws_sdk_s3::config::Credentials::new("test", "test", None, None, "test"),
            ))
            .build();
        aws_sdk_s3::Client::from_conf(config)
    }
}

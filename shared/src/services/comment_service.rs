use aws_sdk_dynamodb::{types::AttributeValue, Client as DynamoClient};
use chrono::{DateTime, Utc};

use super::items::{self, Item};
use crate::keys;
use crate::{
    env_or_resource, generate_id, Claims, Comment, Role, Tenant, TransferError, TransferResult,
    MAX_COMMENT_LENGTH,
};

pub fn validate_document_id(document_id: &str) -> TransferResult<()> {
    if document_id.is_empty() {
        return Err(TransferError::ValidationError(
            "Document ID cannot be empty".to_string(),
        ));
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-');
    if !document_id.chars().all(allowed) {
        return Err(TransferError::ValidationError(format!(
            "Invalid document ID: {}",
            document_id
        )));
    }
    Ok(())
}

/// Trimmed comment body, 1..=MAX_COMMENT_LENGTH characters
pub fn normalize_comment_body(body: &str) -> TransferResult<String> {
    let body = body.trim();
    if body.is_empty() {
        return Err(TransferError::ValidationError(
            "Comment cannot be empty".to_string(),
        ));
    }
    if body.chars().count() > MAX_COMMENT_LENGTH {
        return Err(TransferError::ValidationError(format!(
            "Comment exceeds {} characters",
            MAX_COMMENT_LENGTH
        )));
    }
    Ok(body.to_string())
}

pub struct CommentService {
    client: DynamoClient,
    table_name: String,
    tenant: Tenant,
}

impl CommentService {
    pub fn new(client: DynamoClient, table_name: String, tenant: Tenant) -> Self {
        Self {
            client,
            table_name,
            tenant,
        }
    }

    pub fn from_env(client: DynamoClient) -> TransferResult<Self> {
        let table_name = env_or_resource("TABLE_NAME", "main")?;
        tracing::info!("CommentService initialized with table: {}", table_name);
        Ok(Self::new(client, table_name, Tenant::current()))
    }

    /// Oldest first
    pub async fn list_comments(&self, document_id: &str) -> TransferResult<Vec<Comment>> {
        validate_document_id(document_id)?;

        let mut comments = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let result = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("PK = :pk AND begins_with(SK, :prefix)")
                .expression_attribute_values(
                    ":pk",
                    AttributeValue::S(keys::document_pk(&self.tenant, document_id)),
                )
                .expression_attribute_values(
                    ":prefix",
                    AttributeValue::S(keys::COMMENT_SK_PREFIX.to_string()),
                )
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| TransferError::DynamoDBError(e.to_string()))?;

            for item in result.items.unwrap_or_default() {
                comments.push(item_to_comment(&item)?);
            }

            match result.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(comments)
    }

    pub async fn add_comment(
        &self,
        document_id: &str,
        author: &str,
        body: &str,
    ) -> TransferResult<Comment> {
        validate_document_id(document_id)?;
        let comment = Comment {
            comment_id: generate_id(),
            document_id: document_id.to_string(),
            author: author.to_string(),
            body: normalize_comment_body(body)?,
            created_at: Utc::now(),
        };

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(comment_to_item(&self.tenant, &comment)))
            .send()
            .await
            .map_err(|e| TransferError::DynamoDBError(e.to_string()))?;

        tracing::info!(
            "Added comment {} to document {}",
            comment.comment_id,
            document_id
        );
        Ok(comment)
    }

    /// Only the comment's author or an admin may delete it
    pub async fn delete_comment(
        &self,
        document_id: &str,
        comment_id: &str,
        caller: &Claims,
    ) -> TransferResult<()> {
        let comment = self
            .list_comments(document_id)
            .await?
            .into_iter()
            .find(|c| c.comment_id == comment_id)
            .ok_or_else(|| TransferError::NotFound(format!("Comment {}", comment_id)))?;

        ensure_can_delete(&comment, caller)?;

        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key(
                keys::PK,
                AttributeValue::S(keys::document_pk(&self.tenant, document_id)),
            )
            .key(
                keys::SK,
                AttributeValue::S(keys::comment_sk(comment.created_at, comment_id)),
            )
            .send()
            .await
            .map_err(|e| TransferError::DynamoDBError(e.to_string()))?;

        tracing::info!("Deleted comment {} from document {}", comment_id, document_id);
        Ok(())
    }
}

pub fn can_delete(comment: &Comment, caller: &Claims) -> bool {
    caller.role >= Role::Admin || comment.author.eq_ignore_ascii_case(&caller.email)
}

pub fn ensure_can_delete(comment: &Comment, caller: &Claims) -> TransferResult<()> {
    if can_delete(comment, caller) {
        Ok(())
    } else {
        Err(TransferError::Forbidden(
            "Only the author or an admin can delete this comment".to_string(),
        ))
    }
}

pub fn comment_to_item(tenant: &Tenant, comment: &Comment) -> Item {
    let mut item = Item::new();
    items::put_s(&mut item, keys::PK, keys::document_pk(tenant, &comment.document_id));
    items::put_s(
        &mut item,
        keys::SK,
        keys::comment_sk(comment.created_at, &comment.comment_id),
    );
    items::put_s(&mut item, "entity_type", "COMMENT");
    items::put_s(&mut item, "comment_id", comment.comment_id.clone());
    items::put_s(&mut item, "document_id", comment.document_id.clone());
    items::put_s(&mut item, "author", comment.author.clone());
    items::put_s(&mut item, "body", comment.body.clone());
    items::put_s(&mut item, "created_at", keys::sort_timestamp(comment.created_at));
    item
}

pub fn item_to_comment(item: &Item) -> TransferResult<Comment> {
    let created_at: DateTime<Utc> = items::get_datetime(item, "created_at")?;
    Ok(Comment {
        comment_id: items::get_s(item, "comment_id")?,
        document_id: items::get_s(item, "document_id")?,
        author: items::get_s(item, "author")?,
        body: items::get_s(item, "body")?,
        created_at,
    })
}

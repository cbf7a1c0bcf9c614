use actix_web::{delete, get, http::StatusCode, post, put, web, HttpResponse, ResponseError};
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    auth::Identity,
    error::SplitError,
    exchange::suggested_transfers,
    money::Cents,
    schemas::{parse_members, Expense, Group, MemberId},
    store::{GroupStore, StoreError},
};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("missing or invalid credentials")]
    Unauthorized,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Internal(String),
}

impl From<SplitError> for ServerError {
    fn from(err: SplitError) -> Self {
        Self::Store(StoreError::Split(err))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Store(err) => match err {
                StoreError::GroupNotFound(_) | StoreError::ExpenseNotFound { .. } => {
                    StatusCode::NOT_FOUND
                }
                StoreError::GroupExists(_) | StoreError::Split(SplitError::DuplicateExpense(_)) => {
                    StatusCode::CONFLICT
                }
                StoreError::Split(
                    SplitError::EmptyName
                    | SplitError::EmptyMember
                    | SplitError::NoMembers
                    | SplitError::DuplicateMember(_)
                    | SplitError::InvalidAmount(_),
                ) => StatusCode::BAD_REQUEST,
                StoreError::Split(_) => StatusCode::UNPROCESSABLE_ENTITY,
                StoreError::Mongo(_) | StoreError::Bson(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        }
        HttpResponse::build(status).json(ErrorBody {
            error: self.to_string(),
        })
    }
}

/// Members as a JSON list or as the comma-separated text typed in the app.
#[derive(Deserialize, Serialize)]
#[serde(untagged)]
pub enum MembersJson {
    List(Vec<MemberId>),
    Text(String),
}

#[derive(Deserialize, Serialize)]
pub struct NewGroupJson {
    pub name: String,
    pub members: MembersJson,
}

/// An amount as integer minor units (`1234`) or decimal text (`"12.34"`).
#[derive(Deserialize, Serialize)]
#[serde(untagged)]
pub enum AmountJson {
    Cents(Cents),
    Text(String),
}

impl AmountJson {
    fn into_cents(self) -> Result<Cents, SplitError> {
        match self {
            AmountJson::Cents(cents) => Ok(cents),
            AmountJson::Text(text) => text.parse(),
        }
    }
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExpenseJson {
    pub id: Option<String>,
    #[serde(default)]
    pub description: String,
    pub amount: AmountJson,
    pub paid_by: MemberId,
    pub split_between: Vec<MemberId>,
    pub date: Option<DateTime<Utc>>,
}

impl NewExpenseJson {
    fn into_expense(self) -> Result<Expense, SplitError> {
        Ok(Expense {
            id: self.id.unwrap_or_else(|| ObjectId::new().to_hex()),
            description: self.description,
            amount: self.amount.into_cents()?,
            paid_by: self.paid_by,
            split_between: self.split_between,
            date: self.date.unwrap_or_else(Utc::now),
        })
    }
}

/// Loads a group the caller may see. Groups owned by someone else look
/// missing.
async fn visible_group(
    store: &GroupStore,
    identity: &Identity,
    id: &str,
) -> Result<Group, ServerError> {
    let group = store.get_group(id).await?;
    if identity.can_access(group.owner.as_deref()) {
        Ok(group)
    } else {
        Err(StoreError::GroupNotFound(id.to_string()).into())
    }
}

#[get("/groups")]
async fn list_groups(
    store: web::Data<GroupStore>,
    identity: Identity,
) -> Result<HttpResponse, ServerError> {
    let groups = store.list_groups(identity.owner()).await?;
    Ok(HttpResponse::Ok().json(groups))
}

#[put("/groups/{id}")]
async fn add_group(
    store: web::Data<GroupStore>,
    identity: Identity,
    id: web::Path<String>,
    json: web::Json<NewGroupJson>,
) -> Result<HttpResponse, ServerError> {
    let json = json.into_inner();
    let members = match json.members {
        MembersJson::List(members) => members,
        MembersJson::Text(text) => parse_members(&text)?,
    };
    let mut group = Group::new(id.into_inner(), json.name, members)?;
    if let Some(owner) = identity.owner() {
        group = group.with_owner(owner);
    }

    let group = store.create_group(group).await?;
    tracing::info!("group {} created with {} members", group.id, group.members.len());
    Ok(HttpResponse::Created().json(group))
}

#[get("/groups/{id}")]
async fn get_group(
    store: web::Data<GroupStore>,
    identity: Identity,
    id: web::Path<String>,
) -> Result<HttpResponse, ServerError> {
    let group = visible_group(&store, &identity, &id).await?;
    Ok(HttpResponse::Ok().json(group))
}

#[delete("/groups/{id}")]
async fn delete_group(
    store: web::Data<GroupStore>,
    identity: Identity,
    id: web::Path<String>,
) -> Result<HttpResponse, ServerError> {
    let id = id.into_inner();
    visible_group(&store, &identity, &id).await?;
    store.delete_group(&id).await?;
    tracing::info!("group {id} deleted");
    Ok(HttpResponse::NoContent().finish())
}

#[post("/groups/{id}/expenses")]
async fn add_expense(
    store: web::Data<GroupStore>,
    identity: Identity,
    id: web::Path<String>,
    expense: web::Json<NewExpenseJson>,
) -> Result<HttpResponse, ServerError> {
    let id = id.into_inner();
    visible_group(&store, &identity, &id).await?;
    let expense = expense.into_inner().into_expense()?;
    let expense = store.add_expense(&id, expense).await?;
    tracing::info!("expense {} added to group {id}", expense.id);
    Ok(HttpResponse::Created().json(expense))
}

#[delete("/groups/{id}/expenses/{expense_id}")]
async fn remove_expense(
    store: web::Data<GroupStore>,
    identity: Identity,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ServerError> {
    let (id, expense_id) = path.into_inner();
    visible_group(&store, &identity, &id).await?;
    store.remove_expense(&id, &expense_id).await?;
    tracing::info!("expense {expense_id} removed from group {id}");
    Ok(HttpResponse::NoContent().finish())
}

#[get("/groups/{id}/balance")]
async fn get_balance(
    store: web::Data<GroupStore>,
    identity: Identity,
    id: web::Path<String>,
) -> Result<HttpResponse, ServerError> {
    let group = visible_group(&store, &identity, &id).await?;
    Ok(HttpResponse::Ok().json(group.balances()?))
}

#[get("/groups/{id}/settle-up")]
async fn get_settle_up(
    store: web::Data<GroupStore>,
    identity: Identity,
    id: web::Path<String>,
) -> Result<HttpResponse, ServerError> {
    let group = visible_group(&store, &identity, &id).await?;
    Ok(HttpResponse::Ok().json(group.settle_up()?))
}

#[get("/groups/{id}/exchanges")]
async fn get_exchanges(
    store: web::Data<GroupStore>,
    identity: Identity,
    id: web::Path<String>,
) -> Result<HttpResponse, ServerError> {
    let group = visible_group(&store, &identity, &id).await?;
    Ok(HttpResponse::Ok().json(suggested_transfers(&group.members, &group.expenses)?))
}

/// Registers every endpoint; the app must provide `web::Data<GroupStore>`
/// and `web::Data<AuthSettings>`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_groups)
        .service(add_group)
        .service(get_group)
        .service(delete_group)
        .service(add_expense)
        .service(remove_expense)
        .service(get_balance)
        .service(get_settle_up)
        .service(get_exchanges);
}

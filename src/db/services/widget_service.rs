use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::collections::HashMap;
use thiserror::Error;
use tracing::info;

use crate::db::entities::{prelude::*, service_entry, widget, widget_value};
use crate::web::models::widget_models::CreateWidgetRequest;

#[derive(Error, Debug)]
pub enum WidgetError {
    #[error("Widget not found")]
    NotFound,
    #[error("A widget named '{0}' already exists")]
    AlreadyExists(String),
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

pub async fn list_widgets(db: &DatabaseConnection) -> Result<Vec<widget::Model>, DbErr> {
    Widget::find()
        .order_by_asc(widget::Column::WidgetName)
        .all(db)
        .await
}

pub async fn find_widget_by_name<C: ConnectionTrait>(
    conn: &C,
    name: &str,
) -> Result<Option<widget::Model>, DbErr> {
    Widget::find()
        .filter(widget::Column::WidgetName.eq(name))
        .one(conn)
        .await
}

pub async fn create_widget(
    db: &DatabaseConnection,
    request: CreateWidgetRequest,
) -> Result<widget::Model, WidgetError> {
    if find_widget_by_name(db, &request.widget_name).await?.is_some() {
        return Err(WidgetError::AlreadyExists(request.widget_name));
    }
    let created = widget::ActiveModel {
        widget_name: Set(request.widget_name),
        widget_type: Set(request.widget_type),
        widget_url: Set(request.widget_url),
        widget_api_key: Set(request.widget_api_key),
        widget_fields: Set(serde_json::json!(request.widget_fields)),
        ..Default::default()
    }
    .insert(db)
    .await?;
    info!(widget = %created.widget_name, widget_type = %created.widget_type, "Created widget.");
    Ok(created)
}

/// Removes a widget together with its cached values and detaches every entry
/// that pointed at it.
pub async fn delete_widget(db: &DatabaseConnection, widget_id: i32) -> Result<(), WidgetError> {
    let txn = db.begin().await?;
    let widget = Widget::find_by_id(widget_id)
        .one(&txn)
        .await?
        .ok_or(WidgetError::NotFound)?;

    let detached = ServiceEntry::update_many()
        .col_expr(
            service_entry::Column::WidgetId,
            Expr::value(Option::<i32>::None),
        )
        .filter(service_entry::Column::WidgetId.eq(widget.id))
        .exec(&txn)
        .await?;
    WidgetValue::delete_many()
        .filter(widget_value::Column::WidgetId.eq(widget.id))
        .exec(&txn)
        .await?;
    Widget::delete_by_id(widget.id).exec(&txn).await?;
    txn.commit().await?;

    info!(
        widget = %widget.widget_name,
        detached_entries = detached.rows_affected,
        "Deleted widget."
    );
    Ok(())
}

pub async fn get_widget_values(
    db: &DatabaseConnection,
    widget_id: i32,
) -> Result<Vec<widget_value::Model>, WidgetError> {
    Widget::find_by_id(widget_id)
        .one(db)
        .await?
        .ok_or(WidgetError::NotFound)?;
    let values = WidgetValue::find()
        .filter(widget_value::Column::WidgetId.eq(widget_id))
        .order_by_asc(widget_value::Column::WidgetValueKey)
        .all(db)
        .await?;
    Ok(values)
}

/// Writes one row per `(widget_id, key)`, updating rows that already exist.
pub async fn upsert_widget_values<C: ConnectionTrait>(
    conn: &C,
    widget_id: i32,
    values: &HashMap<String, String>,
    now: DateTime<Utc>,
) -> Result<(), DbErr> {
    for (key, value) in values {
        let existing = WidgetValue::find()
            .filter(widget_value::Column::WidgetId.eq(widget_id))
            .filter(widget_value::Column::WidgetValueKey.eq(key.as_str()))
            .one(conn)
            .await?;
        match existing {
            Some(row) => {
                let mut row: widget_value::ActiveModel = row.into();
                row.widget_value = Set(Some(value.clone()));
                row.last_updated = Set(now);
                row.update(conn).await?;
            }
            None => {
                widget_value::ActiveModel {
                    widget_id: Set(widget_id),
                    widget_value_key: Set(key.clone()),
                    widget_value: Set(Some(value.clone())),
                    last_updated: Set(now),
                    ..Default::default()
                }
                .insert(conn)
                .await?;
            }
        }
    }
    Ok(())
}

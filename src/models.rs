use chrono::{DateTime, Utc};
use diesel::{
    Selectable,
    prelude::{AsChangeset, Identifiable, Insertable, Queryable},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

// Orders

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderEntity {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub table_number: String,
    pub status: String,
    pub subtotal: f64,
    pub tax_amount: f64,
    pub total_amount: f64,
    pub payment_method: Option<String>,
    pub special_instructions: Option<String>,
    pub estimated_preparation_time: Option<i32>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateOrderEntity {
    pub user_id: Option<Uuid>,
    pub table_number: String,
    pub status: String,
    pub subtotal: f64,
    pub tax_amount: f64,
    pub total_amount: f64,
    pub payment_method: Option<String>,
    pub special_instructions: Option<String>,
    pub estimated_preparation_time: Option<i32>,
    pub idempotency_key: Option<String>,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::order_items)]
#[diesel(belongs_to(OrderEntity, foreign_key = order_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderItemEntity {
    pub id: Uuid,
    pub order_id: Uuid,
    pub menu_item_id: Uuid,
    pub quantity: i32,
    pub unit_price: f64,
    pub total_price: f64,
    pub special_instructions: Option<String>,
    pub item_status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::order_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateOrderItemEntity {
    pub order_id: Uuid,
    pub menu_item_id: Uuid,
    pub quantity: i32,
    pub unit_price: f64,
    pub total_price: f64,
    pub special_instructions: Option<String>,
    pub item_status: String,
}

// Menu

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::menu_categories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MenuCategoryEntity {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub display_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Deserialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::menu_categories)]
pub struct CreateMenuCategoryEntity {
    pub name: String,
    pub description: Option<String>,
    pub display_order: i32,
}

#[derive(AsChangeset, Deserialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::menu_categories)]
pub struct UpdateMenuCategoryEntity {
    pub name: Option<String>,
    pub description: Option<String>,
    pub display_order: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::menu_items)]
#[diesel(belongs_to(MenuCategoryEntity, foreign_key = category_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MenuItemEntity {
    pub id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub image_url: Option<String>,
    pub preparation_time: i32,
    pub is_available: bool,
    pub is_vegetarian: bool,
    pub is_vegan: bool,
    pub spice_level: Option<i32>,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Deserialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::menu_items)]
pub struct CreateMenuItemEntity {
    pub category_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub image_url: Option<String>,
    pub preparation_time: i32,
    pub is_vegetarian: bool,
    pub is_vegan: bool,
    pub spice_level: Option<i32>,
    pub display_order: i32,
}

#[derive(AsChangeset, Deserialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::menu_items)]
pub struct UpdateMenuItemEntity {
    pub category_id: Option<Uuid>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub image_url: Option<String>,
    pub preparation_time: Option<i32>,
    pub is_available: Option<bool>,
    pub is_vegetarian: Option<bool>,
    pub is_vegan: Option<bool>,
    pub spice_level: Option<i32>,
    pub display_order: Option<i32>,
}

// Dining tables

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::dining_tables)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DiningTableEntity {
    pub id: Uuid,
    pub table_number: String,
    pub qr_code: Option<String>,
    pub capacity: i32,
    pub location: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Payments

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::payments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PaymentEntity {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: Option<Uuid>,
    pub amount: f64,
    pub payment_method: String,
    pub payment_status: String,
    pub provider_ref: Option<String>,
    pub failure_reason: Option<String>,
    pub split_info: Option<Value>,
    pub refund_amount: f64,
    pub refund_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::payments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreatePaymentEntity {
    pub order_id: Uuid,
    pub user_id: Option<Uuid>,
    pub amount: f64,
    pub payment_method: String,
    pub payment_status: String,
    pub split_info: Option<Value>,
}

// Notifications

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NotificationEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub read: bool,
    pub data: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateNotificationEntity {
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub data: Option<Value>,
}

// Feedback

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::feedback)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct FeedbackEntity {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub rating: i32,
    pub food_rating: Option<i32>,
    pub service_rating: Option<i32>,
    pub review_text: Option<String>,
    pub admin_response: Option<String>,
    pub is_helpful_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::feedback)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateFeedbackEntity {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub rating: i32,
    pub food_rating: Option<i32>,
    pub service_rating: Option<i32>,
    pub review_text: Option<String>,
}

// User roles

#[derive(Queryable, Selectable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::user_roles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserRoleEntity {
    pub user_id: Uuid,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

// Audit logs

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::audit_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AuditLogEntity {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub table_name: String,
    pub record_id: Option<Uuid>,
    pub old_data: Option<Value>,
    pub new_data: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::audit_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateAuditLogEntity {
    pub user_id: Option<Uuid>,
    pub action: String,
    pub table_name: String,
    pub record_id: Option<Uuid>,
    pub old_data: Option<Value>,
    pub new_data: Option<Value>,
}

// AI conversations

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::ai_conversations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AiConversationEntity {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub session_id: String,
    pub message: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::ai_conversations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateAiConversationEntity {
    pub user_id: Option<Uuid>,
    pub session_id: String,
    pub message: String,
    pub response: String,
}

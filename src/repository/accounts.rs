use sqlx::FromRow;

use crate::{db::DbPool, error::AppResult, models::User, status::Role};

pub async fn find_user_by_email(pool: &DbPool, email: &str) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, email, password_hash, role, created_at FROM users \
         WHERE email = $1 AND deleted_at IS NULL",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn find_user(pool: &DbPool, id: i64) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, email, password_hash, role, created_at FROM users \
         WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn insert_user(
    pool: &DbPool,
    email: &str,
    password_hash: &str,
    role: Role,
) -> AppResult<User> {
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (email, password_hash, role) VALUES ($1, $2, $3) \
         RETURNING id, email, password_hash, role, created_at",
    )
    .bind(email)
    .bind(password_hash)
    .bind(role.as_str())
    .fetch_one(pool)
    .await?;
    Ok(user)
}

pub async fn user_address_belongs_to(
    pool: &DbPool,
    user_address_id: i64,
    user_id: i64,
) -> AppResult<bool> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT id FROM user_addresses WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL",
    )
    .bind(user_address_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.is_some())
}

#[derive(Debug, Clone, Copy, FromRow)]
pub struct ConsultationParticipants {
    pub user_id: i64,
    pub doctor_id: i64,
}

impl ConsultationParticipants {
    pub fn includes(&self, user_id: i64) -> bool {
        self.user_id == user_id || self.doctor_id == user_id
    }
}

pub async fn consultation_participants(
    pool: &DbPool,
    consultation_id: i64,
) -> AppResult<Option<ConsultationParticipants>> {
    let row = sqlx::query_as::<_, ConsultationParticipants>(
        "SELECT user_id, doctor_id FROM consultations WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(consultation_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

#[derive(Debug, Clone, FromRow)]
pub struct PrescribedProduct {
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i32,
}

pub async fn prescription_items(
    pool: &DbPool,
    consultation_id: i64,
) -> AppResult<Vec<PrescribedProduct>> {
    let rows = sqlx::query_as::<_, PrescribedProduct>(
        r#"
        SELECT pi.product_id, pr.name AS product_name, pi.quantity
        FROM prescription_items pi
        JOIN products pr ON pr.id = pi.product_id
        WHERE pi.consultation_id = $1 AND pi.deleted_at IS NULL
        ORDER BY pi.id
        "#,
    )
    .bind(consultation_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, EntityTrait, QuerySelect};
use uuid::Uuid;

use crate::{
    entity::products::{Column as ProdCol, Entity as Products},
    error::{AppError, AppResult},
};

/// Current catalog price for a product. Used as a price oracle only; order
/// lines copy the value and never come back here.
pub async fn unit_price<C>(conn: &C, product_id: Uuid) -> AppResult<Decimal>
where
    C: ConnectionTrait,
{
    Products::find_by_id(product_id)
        .select_only()
        .column(ProdCol::Price)
        .into_tuple::<Decimal>()
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

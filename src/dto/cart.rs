use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::CartLine;

/// `quantity` is kept loose so a non-numeric value is reported as an invalid
/// argument instead of a body rejection. Omitted or null means 1.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: Option<Uuid>,
    #[serde(default)]
    #[schema(value_type = Option<i32>, example = 1)]
    pub quantity: Option<Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartList {
    pub items: Vec<CartLine>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RemovedLine {
    pub product_id: Uuid,
    pub removed: bool,
}

use diesel::prelude::*;
use diesel::sql_types::BigInt;
use serde::{Deserialize, Serialize};

use crate::schema::{ingredients, recipe_ingredients, recipes, tableware};

/// Store-assigned row id. Positive, never reused.
pub(crate) type Id = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Ingredient {
    pub name: String,
    pub kcal: u32,
    pub id: Id,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Tableware {
    pub name: String,
    pub weight: u32,
    pub id: Id,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RecipeHeader {
    pub name: String,
    pub id: Id,
}

// pair <ingredient, gram>
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RecipeIngredient {
    #[serde(rename = "id")]
    pub ingredient_id: Id, //foreign key
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct FullRecipe {
    pub header: RecipeHeader,
    pub description: String,
    pub ingredients: Vec<RecipeIngredient>,
}

// Rows as SQLite hands them back. Integers are stored as INTEGER and decoded
// as i64, then narrowed to the domain type.

#[derive(Debug, QueryableByName)]
#[diesel(table_name = ingredients)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub(crate) struct IngredientRow {
    pub id: i64,
    pub name: String,
    pub kcal: i64,
}

#[derive(Debug, QueryableByName)]
#[diesel(table_name = tableware)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub(crate) struct TablewareRow {
    pub id: i64,
    pub name: String,
    pub weight: i64,
}

#[derive(Debug, QueryableByName)]
#[diesel(table_name = recipes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub(crate) struct RecipeHeaderRow {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, QueryableByName)]
#[diesel(table_name = recipes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub(crate) struct RecipeRow {
    pub id: i64,
    pub name: String,
    pub description: String,
}

#[derive(Debug, QueryableByName)]
#[diesel(table_name = recipe_ingredients)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub(crate) struct RecipeIngredientRow {
    pub ingredient_id: i64,
    pub weight: i64,
}

/// Single id column, whatever the table calls it; queries alias it to `id`.
#[derive(Debug, QueryableByName)]
pub(crate) struct IdRow {
    #[diesel(sql_type = BigInt)]
    pub id: i64,
}

/// Only u32 values are ever bound into these columns, so anything else means
/// the schema was tampered with.
fn narrow(value: i64, column: &str) -> u32 {
    u32::try_from(value)
        .unwrap_or_else(|_| panic!("column `{column}` holds {value}, which does not fit u32"))
}

impl From<IngredientRow> for Ingredient {
    fn from(row: IngredientRow) -> Self {
        Ingredient {
            name: row.name,
            kcal: narrow(row.kcal, "ingredients.kcal"),
            id: row.id,
        }
    }
}

impl From<TablewareRow> for Tableware {
    fn from(row: TablewareRow) -> Self {
        Tableware {
            name: row.name,
            weight: narrow(row.weight, "tableware.weight"),
            id: row.id,
        }
    }
}

impl From<RecipeHeaderRow> for RecipeHeader {
    fn from(row: RecipeHeaderRow) -> Self {
        RecipeHeader {
            name: row.name,
            id: row.id,
        }
    }
}

impl From<RecipeIngredientRow> for RecipeIngredient {
    fn from(row: RecipeIngredientRow) -> Self {
        RecipeIngredient {
            ingredient_id: row.ingredient_id,
            weight: narrow(row.weight, "recipe_ingredients.weight"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipe_serializes_with_short_ingredient_keys() {
        let recipe = FullRecipe {
            header: RecipeHeader {
                name: "pancake".to_string(),
                id: 1,
            },
            description: "do it".to_string(),
            ingredients: vec![RecipeIngredient {
                ingredient_id: 2,
                weight: 200,
            }],
        };

        let json = serde_json::to_value(&recipe).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "header": {"name": "pancake", "id": 1},
                "description": "do it",
                "ingredients": [{"id": 2, "weight": 200}],
            })
        );
    }

    #[test]
    #[should_panic(expected = "does not fit u32")]
    fn negative_weight_in_row_is_fatal() {
        let _ = RecipeIngredient::from(RecipeIngredientRow {
            ingredient_id: 1,
            weight: -5,
        });
    }
}

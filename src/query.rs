use std::collections::BTreeMap;

use crate::db::{exec, execute, insert, select_id, Param, Store};
use crate::error::StoreError;
use crate::models::{
    FullRecipe, Id, Ingredient, IngredientRow, RecipeHeader, RecipeHeaderRow, RecipeIngredient,
    RecipeIngredientRow, RecipeRow, Tableware, TablewareRow,
};
use crate::schema::{INGREDIENTS, RECIPES, RECIPE_INGREDIENTS, TABLEWARE};

const DB_FAILURE: &str = "DB request failed. Try again later.";

/// Replaces the raw database message with one meant for the user.
fn reword(err: StoreError, on_constraint: &str) -> StoreError {
    match err {
        StoreError::InvalidArgument(_) => StoreError::InvalidArgument(on_constraint.to_string()),
        StoreError::Internal(_) => StoreError::Internal(DB_FAILURE.to_string()),
        other => other,
    }
}

impl Store {
    pub(crate) fn add_product(&self, name: &str, kcal: u32) -> Result<Id, StoreError> {
        self.add_named(
            INGREDIENTS,
            "kcal",
            name,
            kcal,
            "This ingredient already exists in the database.",
        )
    }

    pub(crate) fn add_tableware(&self, name: &str, weight: u32) -> Result<Id, StoreError> {
        self.add_named(
            TABLEWARE,
            "weight",
            name,
            weight,
            "This pot already exists in the database.",
        )
    }

    // Ingredients and tableware share a shape: a name plus one number, unique
    // as a pair. The lookup runs in the insert's transaction, so a failed
    // lookup also takes the new row back out.
    fn add_named(
        &self,
        table: &str,
        value_field: &str,
        name: &str,
        value: u32,
        duplicate: &str,
    ) -> Result<Id, StoreError> {
        if name.is_empty() {
            return Err(StoreError::InvalidArgument(
                "Name must be non-empty.".to_string(),
            ));
        }

        let fields = ["name", value_field];
        let params = [Param::from(name), Param::from(value)];
        self.transaction(|conn| {
            insert(conn, table, &fields, &params).map_err(|err| reword(err, duplicate))?;
            select_id(conn, table, &fields, &params, "id")
        })
    }

    pub(crate) fn get_product(&self, id: Id) -> Result<Ingredient, StoreError> {
        let rows: Vec<IngredientRow> = self.transaction(|conn| {
            exec(
                conn,
                "SELECT id, name, kcal FROM ingredients WHERE id = ?;",
                &[Param::Int(id)],
            )
        })?;

        rows.into_iter()
            .next()
            .map(Ingredient::from)
            .ok_or_else(|| StoreError::NotFound(format!("Product with id={id} wasn't found.")))
    }

    pub(crate) fn get_products(&self) -> Result<Vec<Ingredient>, StoreError> {
        let rows: Vec<IngredientRow> = self.transaction(|conn| {
            exec(conn, "SELECT id, name, kcal FROM ingredients ORDER BY id;", &[])
        })?;
        Ok(rows.into_iter().map(Ingredient::from).collect())
    }

    pub(crate) fn get_tableware(&self) -> Result<Vec<Tableware>, StoreError> {
        let rows: Vec<TablewareRow> = self.transaction(|conn| {
            exec(conn, "SELECT id, name, weight FROM tableware ORDER BY id;", &[])
        })?;
        Ok(rows.into_iter().map(Tableware::from).collect())
    }

    /// Fails while any recipe still lists the ingredient.
    pub(crate) fn delete_product(&self, id: Id) -> bool {
        self.delete("DELETE FROM ingredients WHERE id = ?;", id)
    }

    pub(crate) fn delete_tableware(&self, id: Id) -> bool {
        self.delete("DELETE FROM tableware WHERE id = ?;", id)
    }

    /// Removing the header cascades to its ingredient rows.
    pub(crate) fn delete_recipe(&self, id: Id) -> bool {
        self.delete("DELETE FROM recipes WHERE id = ?;", id)
    }

    // Unknown ids delete nothing and still count as success.
    fn delete(&self, sql: &str, id: Id) -> bool {
        match self.transaction(|conn| execute(conn, sql, &[Param::Int(id)])) {
            Ok(removed) => {
                log::debug!("`{sql}` id={id} removed {removed} rows");
                true
            }
            Err(err) => {
                log::warn!("`{sql}` id={id} left the row in place: {err}");
                false
            }
        }
    }

    /// Creates a recipe with its ingredient list in one transaction.
    ///
    /// Entries with zero weight are dropped. If any remaining ingredient id is
    /// unknown, nothing is written and the call fails with `InvalidArgument`.
    pub(crate) fn create_recipe(
        &self,
        name: &str,
        description: &str,
        ingredients: &BTreeMap<Id, u32>,
    ) -> Result<Id, StoreError> {
        if name.is_empty() {
            return Err(StoreError::InvalidArgument(
                "Name of the recipe has to be non-empty.".to_string(),
            ));
        }

        self.transaction(|conn| {
            insert(
                conn,
                RECIPES,
                &["name", "description"],
                &[name.into(), description.into()],
            )
            .map_err(|err| {
                reword(err, "A recipe with this name already exists in the database.")
            })?;

            let recipe_id = select_id(conn, RECIPES, &["name"], &[name.into()], "id")?;

            let params: Vec<Param> = ingredients
                .iter()
                .filter(|(_, &weight)| weight > 0)
                .flat_map(|(&ingredient_id, &weight)| {
                    [
                        Param::Int(recipe_id),
                        Param::Int(ingredient_id),
                        Param::from(weight),
                    ]
                })
                .collect();

            insert(
                conn,
                RECIPE_INGREDIENTS,
                &["recipe_id", "ingredient_id", "weight"],
                &params,
            )
            .map_err(|err| {
                reword(err, "Some of the ingredients don't exist in the database.")
            })?;

            log::info!(
                "created recipe {name:?} id={recipe_id} with {} ingredients",
                params.len() / 3
            );
            Ok(recipe_id)
        })
    }

    pub(crate) fn get_recipes(&self) -> Result<Vec<RecipeHeader>, StoreError> {
        let rows: Vec<RecipeHeaderRow> = self.transaction(|conn| {
            exec(conn, "SELECT id, name FROM recipes ORDER BY id;", &[])
        })?;
        Ok(rows.into_iter().map(RecipeHeader::from).collect())
    }

    /// A recipe without ingredients is returned with an empty list.
    pub(crate) fn get_recipe_info(&self, recipe_id: Id) -> Result<FullRecipe, StoreError> {
        self.transaction(|conn| {
            let headers: Vec<RecipeRow> = exec(
                conn,
                "SELECT id, name, description FROM recipes WHERE id = ?;",
                &[Param::Int(recipe_id)],
            )?;
            let header = headers.into_iter().next().ok_or_else(|| {
                StoreError::NotFound(format!(
                    "No recipe with id={recipe_id} exists in the database."
                ))
            })?;

            let ingredients: Vec<RecipeIngredientRow> = exec(
                conn,
                "SELECT ingredient_id, weight FROM recipe_ingredients \
                 WHERE recipe_id = ? ORDER BY ingredient_id;",
                &[Param::Int(recipe_id)],
            )?;

            Ok(FullRecipe {
                header: RecipeHeader {
                    name: header.name,
                    id: header.id,
                },
                description: header.description,
                ingredients: ingredients.into_iter().map(RecipeIngredient::from).collect(),
            })
        })
    }
}

diesel::table! {
    ingredients (id) {
        id -> BigInt,
        name -> Text,
        kcal -> BigInt,
    }
}

diesel::table! {
    tableware (id) {
        id -> BigInt,
        name -> Text,
        weight -> BigInt,
    }
}

diesel::table! {
    recipes (id) {
        id -> BigInt,
        name -> Text,
        description -> Text,
    }
}

diesel::table! {
    recipe_ingredients (recipe_id, ingredient_id) {
        recipe_id -> BigInt,
        ingredient_id -> BigInt,
        weight -> BigInt,
    }
}

diesel::joinable!(recipe_ingredients -> ingredients (ingredient_id));
diesel::joinable!(recipe_ingredients -> recipes (recipe_id));

diesel::allow_tables_to_appear_in_same_query!(ingredients, tableware, recipes, recipe_ingredients,);

// Executed on every open; every statement must stay idempotent.
pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS ingredients (
    id            INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    name          TEXT    NOT NULL CHECK (length(name) > 0),
    kcal          INTEGER NOT NULL DEFAULT 0 CHECK (kcal >= 0),
    UNIQUE (name, kcal)
);

CREATE TABLE IF NOT EXISTS tableware (
    id            INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    name          TEXT    NOT NULL CHECK (length(name) > 0),
    weight        INTEGER NOT NULL CHECK (weight >= 0),
    UNIQUE (name, weight)
);

CREATE TABLE IF NOT EXISTS recipes (
    id            INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    name          TEXT    NOT NULL CHECK (length(name) > 0),
    description   TEXT    NOT NULL,
    UNIQUE (name)
);

CREATE TABLE IF NOT EXISTS recipe_ingredients (
    recipe_id     INTEGER NOT NULL,
    ingredient_id INTEGER NOT NULL,
    weight        INTEGER NOT NULL CHECK (weight > 0),
    PRIMARY KEY (recipe_id, ingredient_id),
    FOREIGN KEY (recipe_id)     REFERENCES recipes(id) ON DELETE CASCADE,
    FOREIGN KEY (ingredient_id) REFERENCES ingredients(id)
);

CREATE INDEX IF NOT EXISTS recipe_ingredients_by_ingredient
    ON recipe_ingredients (ingredient_id);
"#;

// Table names shared by the generic helpers and the entity operations.
pub(crate) const INGREDIENTS: &str = "ingredients";
pub(crate) const TABLEWARE: &str = "tableware";
pub(crate) const RECIPES: &str = "recipes";
pub(crate) const RECIPE_INGREDIENTS: &str = "recipe_ingredients";

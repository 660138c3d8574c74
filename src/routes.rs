use std::collections::BTreeMap;
use std::path::Path;

use actix_files::{Files, NamedFile};
use actix_web::{delete, get, post, web, Error, HttpResponse};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::config::Config;
use crate::db::Store;
use crate::models::Id;

// route -> file under the static directory
const PAGES: [(&str, &str); 4] = [
    ("/", "index.html"),
    ("/ingredients", "ingredients.html"),
    ("/tableware", "tableware.html"),
    ("/new_recipe", "recipe.html"),
];

//the pages post JSON text with a form content type, so bodies are parsed by hand

// Numbers arrive as plain JSON numbers; fractions are truncated once the sign
// has been checked.

#[derive(Debug, Deserialize)]
struct NewIngredient {
    product: String,
    kcal: f64,
}

#[derive(Debug, Deserialize)]
struct NewTableware {
    name: String,
    weight: f64,
}

#[derive(Debug, Deserialize)]
struct NewRecipeHeader {
    name: String,
}

#[derive(Debug, Deserialize)]
struct NewRecipeIngredient {
    id: f64,
    weight: f64,
}

#[derive(Debug, Deserialize)]
struct NewRecipe {
    header: NewRecipeHeader,
    #[serde(default)]
    description: String,
    #[serde(default)]
    ingredients: Vec<NewRecipeIngredient>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DialogflowIntent {
    #[serde(default)]
    display_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DialogflowQuery {
    #[serde(default)]
    query_text: String,
    #[serde(default)]
    intent: DialogflowIntent,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DialogflowRequest {
    #[serde(default)]
    response_id: String,
    #[serde(default)]
    session: String,
    #[serde(default)]
    query_result: DialogflowQuery,
}

fn parse<T: DeserializeOwned>(body: &[u8], shape: &str) -> Result<T, Error> {
    serde_json::from_slice(body)
        .map_err(|err| actix_web::error::ErrorBadRequest(format!("{shape} ({err})")))
}

fn non_negative(value: f64, message: &'static str) -> Result<f64, Error> {
    if value < 0.0 {
        return Err(actix_web::error::ErrorBadRequest(message));
    }
    Ok(value.trunc())
}

fn created(id: Id) -> HttpResponse {
    HttpResponse::Ok().content_type("text/plain").body(id.to_string())
}

fn deleted(ok: bool, what: &'static str) -> Result<HttpResponse, Error> {
    if !ok {
        return Err(actix_web::error::ErrorInternalServerError(what));
    }
    Ok(HttpResponse::Ok().finish())
}

#[get("/get_ingredients")]
async fn get_ingredients(store: web::Data<Store>) -> Result<HttpResponse, Error> {
    let products = web::block(move || store.get_products()).await??;
    Ok(HttpResponse::Ok().json(products))
}

#[post("/add_ingredient")]
async fn add_ingredient(store: web::Data<Store>, body: web::Bytes) -> Result<HttpResponse, Error> {
    let input: NewIngredient = parse(
        &body,
        "Ingredient should have `product` (string) and `kcal` (number) fields.",
    )?;
    let kcal = non_negative(input.kcal, "Ingredient cannot have negative `kcal` value.")? as u32;
    let id = web::block(move || store.add_product(&input.product, kcal)).await??;
    Ok(created(id))
}

#[get("/ingredient/{id}")]
async fn get_ingredient(
    store: web::Data<Store>,
    id: web::Path<Id>,
) -> Result<HttpResponse, Error> {
    let product = web::block(move || store.get_product(id.into_inner())).await??;
    Ok(HttpResponse::Ok().json(product))
}

#[delete("/ingredient/{id}")]
async fn delete_ingredient(
    store: web::Data<Store>,
    id: web::Path<Id>,
) -> Result<HttpResponse, Error> {
    let ok = web::block(move || store.delete_product(id.into_inner())).await?;
    deleted(ok, "The ingredient wasn't deleted. It may still be used by a recipe.")
}

#[get("/get_tableware")]
async fn get_tableware(store: web::Data<Store>) -> Result<HttpResponse, Error> {
    let pots = web::block(move || store.get_tableware()).await??;
    Ok(HttpResponse::Ok().json(pots))
}

#[post("/add_tableware")]
async fn add_tableware(store: web::Data<Store>, body: web::Bytes) -> Result<HttpResponse, Error> {
    let input: NewTableware = parse(
        &body,
        "Tableware should have `name` (string) and `weight` (number) fields.",
    )?;
    let weight = non_negative(input.weight, "The weight couldn't be negative.")? as u32;
    let id = web::block(move || store.add_tableware(&input.name, weight)).await??;
    Ok(created(id))
}

#[delete("/tableware/{id}")]
async fn delete_tableware(
    store: web::Data<Store>,
    id: web::Path<Id>,
) -> Result<HttpResponse, Error> {
    let ok = web::block(move || store.delete_tableware(id.into_inner())).await?;
    deleted(ok, "A pot wasn't deleted. Some SQL error occurred.")
}

#[get("/get_recipes")]
async fn get_recipes(store: web::Data<Store>) -> Result<HttpResponse, Error> {
    let recipes = web::block(move || store.get_recipes()).await??;
    Ok(HttpResponse::Ok().json(recipes))
}

#[post("/create_recipe")]
async fn create_recipe(store: web::Data<Store>, body: web::Bytes) -> Result<HttpResponse, Error> {
    let input: NewRecipe = parse(
        &body,
        "Recipe should have `header.name`, `description` and `ingredients` with numeric `id` and `weight`.",
    )?;

    // a repeated id keeps its last weight
    let mut ingredients: BTreeMap<Id, u32> = BTreeMap::new();
    for ingredient in &input.ingredients {
        let id = non_negative(ingredient.id, "id and weight must be >= 0.")? as Id;
        let weight = non_negative(ingredient.weight, "id and weight must be >= 0.")? as u32;
        ingredients.insert(id, weight);
    }

    let id = web::block(move || {
        store.create_recipe(&input.header.name, &input.description, &ingredients)
    })
    .await??;
    Ok(created(id))
}

#[get("/recipe/{id}")]
async fn get_recipe(store: web::Data<Store>, id: web::Path<Id>) -> Result<HttpResponse, Error> {
    let recipe = web::block(move || store.get_recipe_info(id.into_inner())).await??;
    Ok(HttpResponse::Ok().json(recipe))
}

#[delete("/recipe/{id}")]
async fn delete_recipe(store: web::Data<Store>, id: web::Path<Id>) -> Result<HttpResponse, Error> {
    let ok = web::block(move || store.delete_recipe(id.into_inner())).await?;
    deleted(ok, "DB request failed. Try again later.")
}

/// Wraps `text` the way a Dialogflow fulfillment webhook answers.
fn dialogflow_response(text: String) -> serde_json::Value {
    json!({
        "fulfillmentMessages": [
            {"text": {"text": [text.clone()]}},
        ],
        "payload": {
            "google": {
                "richResponse": {
                    "items": [{"simpleResponse": {"textToSpeech": text}}],
                },
            },
        },
    })
}

#[post("/dialogflow")]
async fn dialogflow(store: web::Data<Store>, body: web::Bytes) -> Result<HttpResponse, Error> {
    let input: DialogflowRequest = parse(&body, "Failed to parse input as json.")?;
    let query = &input.query_result;
    log::info!(
        "[dialogflow] id={} session={} query={} intent={}",
        input.response_id,
        input.session,
        query.query_text,
        query.intent.display_name
    );

    let text = match query.intent.display_name.as_str() {
        "ingredients" => {
            let products = web::block(move || store.get_products()).await??;
            products.iter().fold("Our ingredients:".to_string(), |text, product| {
                format!("{text}\n{} at {} kcal,", product.name, product.kcal)
            })
        }
        "pots" => {
            let pots = web::block(move || store.get_tableware()).await??;
            pots.iter().fold("Our tableware:".to_string(), |text, pot| {
                format!("{text}\n{} at {} gram,", pot.name, pot.weight)
            })
        }
        // unsupported intents get an empty answer
        _ => return Ok(HttpResponse::Ok().finish()),
    };

    Ok(HttpResponse::Ok()
        .content_type("text/json; charset=utf-8")
        .body(dialogflow_response(text).to_string()))
}

#[get("/version")]
async fn version(config: web::Data<Config>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain")
        .body(format!("Recipe book version: {}", config.version))
}

pub(crate) fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(get_ingredients)
        .service(add_ingredient)
        .service(get_ingredient)
        .service(delete_ingredient)
        .service(get_tableware)
        .service(add_tableware)
        .service(delete_tableware)
        .service(get_recipes)
        .service(create_recipe)
        .service(get_recipe)
        .service(delete_recipe)
        .service(dialogflow)
        .service(version);
}

/// The HTML pages and the `/static` mount, all read from `static_dir`.
pub(crate) fn pages(static_dir: &str) -> impl FnOnce(&mut web::ServiceConfig) + '_ {
    move |cfg| {
        for (route, file) in PAGES {
            let path = Path::new(static_dir).join(file);
            cfg.route(
                route,
                web::get().to(move || {
                    let path = path.clone();
                    async move { NamedFile::open_async(path).await }
                }),
            );
        }
        cfg.service(Files::new("/static", static_dir));
    }
}

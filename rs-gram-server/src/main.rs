use std::sync::Mutex;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{get, put, web, App, HttpResponse, HttpServer, Responder};
use log::{info, warn};
use serde::Deserialize;

use rs_gram_core::grammar::export::{to_arrow, to_tracery};
use rs_gram_core::io::{list_datasets, normalize_folder, read_dataset};
use rs_gram_core::{Generator, GrammarInducer, InductionConfig};

const DATA_FOLDER: &str = "./data";
const DATASET_EXTENSION: &str = "dat";

/// Query parameters of the `/v1/induce` endpoint
#[derive(Deserialize)]
struct InduceParams {
	file: Option<String>,
	threshold: Option<f64>,
	allow_empty: Option<bool>,
	prune: Option<bool>,
	best: Option<bool>,
}

/// Query parameters of the `/v1/generate` endpoint
#[derive(Deserialize)]
struct GenerateParams {
	seed: Option<u64>,
	novel: Option<bool>,
	nb_try: Option<usize>,
}

#[derive(Deserialize)]
struct GrammarQuery {
	format: Option<String>,
}

/// Grammar currently served, with the dataset it was induced from as known strings.
struct SharedData {
	generator: Option<Generator>,
}

impl InduceParams {
	/// Default configuration overridden by the query.
	fn config(&self) -> Result<InductionConfig, String> {
		let mut config = InductionConfig::default();
		if let Some(threshold) = self.threshold {
			config.set_relative_similarity_threshold(threshold).map_err(|e| e.to_string())?;
		}
		if let Some(allow_empty) = self.allow_empty {
			config.allow_empty_string = allow_empty;
		}
		if let Some(prune) = self.prune {
			config.prune_redundant = prune;
		}
		if let Some(best) = self.best {
			config.use_best_merge_candidate = best;
		}
		Ok(config)
	}
}

/// HTTP PUT endpoint `/v1/induce`
///
/// Induces a grammar from `./data/{file}.dat` and makes it the served grammar.
/// Returns the induction statistics as JSON.
#[put("/v1/induce")]
async fn put_induce(data: web::Data<Mutex<SharedData>>, query: web::Query<InduceParams>) -> impl Responder {
	let name = match &query.file {
		Some(s) if !s.trim().is_empty() => s.trim(),
		_ => return HttpResponse::BadRequest().body("Missing or empty dataset name"),
	};

	let config = match query.config() {
		Ok(c) => c,
		Err(e) => return HttpResponse::BadRequest().body(e),
	};

	let path = normalize_folder(DATA_FOLDER).join(format!("{}.{}", name, DATASET_EXTENSION));
	let dataset = match read_dataset(&path) {
		Ok(lines) => lines,
		Err(e) => return HttpResponse::NotFound().body(format!("Failed to read dataset: {e}")),
	};

	let inducer = match GrammarInducer::new(config) {
		Ok(i) => i,
		Err(e) => return HttpResponse::BadRequest().body(e.to_string()),
	};
	let induction = match inducer.induce_detailed(&dataset) {
		Ok(i) => i,
		Err(e) => {
			warn!("induction of {} failed: {}", name, e);
			return HttpResponse::UnprocessableEntity().body(e.to_string());
		}
	};

	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Grammar lock failed"),
	};
	shared_data.generator = Some(Generator::new(induction.grammar).with_known(dataset));
	info!("serving grammar induced from {}", name);

	HttpResponse::Ok().json(induction.stats)
}

/// HTTP GET endpoint `/v1/generate`
///
/// Samples one string from the served grammar. `seed` makes the result
/// reproducible; `novel=true` retries up to `nb_try` times to avoid
/// returning a dataset example.
#[get("/v1/generate")]
async fn get_generated(data: web::Data<Mutex<SharedData>>, query: web::Query<GenerateParams>) -> impl Responder {
	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Grammar lock failed"),
	};
	let Some(generator) = shared_data.generator.as_mut() else {
		return HttpResponse::Conflict().body("No grammar induced yet");
	};
	generator.nb_try = query.nb_try.unwrap_or(5);

	let result = match (query.seed, query.novel.unwrap_or(false)) {
		(Some(seed), false) => generator.generate_seeded(seed),
		(None, false) => generator.generate(),
		(_, true) => generator.generate_novel(),
	};

	match result {
		Ok(text) => HttpResponse::Ok().body(text),
		Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
	}
}

/// HTTP GET endpoint `/v1/generate_all`
///
/// Every string of the served grammar, one per line.
#[get("/v1/generate_all")]
async fn get_generate_all(data: web::Data<Mutex<SharedData>>) -> impl Responder {
	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Grammar lock failed"),
	};
	let Some(generator) = shared_data.generator.as_ref() else {
		return HttpResponse::Conflict().body("No grammar induced yet");
	};

	match generator.generate_all() {
		Ok(all) => HttpResponse::Ok().body(all.into_iter().collect::<Vec<_>>().join("\n")),
		Err(e) => HttpResponse::PayloadTooLarge().body(e.to_string()),
	}
}

/// HTTP GET endpoint `/v1/grammar`
///
/// The served grammar as `json` (mapping form, default), `arrow` or `tracery`.
#[get("/v1/grammar")]
async fn get_grammar(data: web::Data<Mutex<SharedData>>, query: web::Query<GrammarQuery>) -> impl Responder {
	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Grammar lock failed"),
	};
	let Some(generator) = shared_data.generator.as_ref() else {
		return HttpResponse::Conflict().body("No grammar induced yet");
	};
	let grammar = generator.grammar();

	let rendered = match query.format.as_deref().unwrap_or("json") {
		"json" => grammar.to_json(),
		"tracery" => to_tracery(grammar),
		"arrow" => Ok(to_arrow(grammar)),
		other => return HttpResponse::BadRequest().body(format!("Unknown format '{other}'")),
	};

	match rendered {
		Ok(text) => HttpResponse::Ok().body(text),
		Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
	}
}

#[get("/v1/datasets")]
async fn get_datasets() -> impl Responder {
	match list_datasets(normalize_folder(DATA_FOLDER), DATASET_EXTENSION) {
		Ok(names) => HttpResponse::Ok().body(names.join("\n")),
		Err(_) => HttpResponse::InternalServerError().body("Failed to list datasets"),
	}
}

/// Main entry point for the server.
///
/// Starts with no grammar; `PUT /v1/induce` loads one from the `./data`
/// folder, and the other endpoints serve it. The grammar is wrapped in a
/// `Mutex` shared by the workers.
///
/// # Notes
/// - The server binds to 127.0.0.1:5000.
/// - Set `RUST_LOG=info` to see induction summaries and requests.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
	env_logger::init();

	let shared_data = SharedData { generator: None };
	let shared_grammar = web::Data::new(Mutex::new(shared_data));

	HttpServer::new(move || {
		App::new()
			.wrap(Logger::default())
			.wrap(Cors::permissive())
			.app_data(shared_grammar.clone())
			.service(put_induce)
			.service(get_generated)
			.service(get_generate_all)
			.service(get_grammar)
			.service(get_datasets)
	})
		.bind(("127.0.0.1", 5000))?
		.run()
		.await
}

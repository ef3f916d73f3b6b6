//! AOI toolbox server.
//!
//! Serves buffer previews, node filtering, boundary pickers, and AOI project
//! generation for the support wizards.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use clap::Parser;
use geo::{Geometry, Point};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use aoibox::aoi::{
    assemble, build_buffers, build_center_feature, generate_project, merge_edited_polygon,
    BufferSpec,
};
use aoibox::boundary::{load_catalog, BoundaryCatalog};
use aoibox::config::Config;
use aoibox::error::AoiError;
use aoibox::geometry::buffer_meters;
use aoibox::index::NodeIndex;
use aoibox::model::{Feature, GeoJsonFeature, GeoJsonFeatureCollection, GeoJsonGeometry, PolyType};
use aoibox::nodes::{self, csv::extract_coordinates, NodeSetStore};

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "AOI toolbox server")]
struct Args {
    /// Config file
    #[arg(short, long, default_value = "config.toml")]
    config: std::path::PathBuf,

    /// Override the configured listen address
    #[arg(long)]
    listen: Option<String>,
}

/// Application state shared across handlers
struct AppState {
    catalog: BoundaryCatalog,
    node_sets: NodeSetStore,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    info!("AOI Toolbox Server");
    let config = Config::load_from_file(&args.config)?;
    let listen = args.listen.unwrap_or_else(|| config.global.listen.clone());

    let catalog = load_catalog(&config)?;
    let node_sets = NodeSetStore::new(Duration::from_secs(config.global.node_set_ttl_secs));

    let state = Arc::new(AppState { catalog, node_sets });

    // Build router
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/v1/countries", get(countries_handler))
        .route("/v1/regions/{country}", get(regions_handler))
        .route(
            "/v1/municipalities/{country}/{region}",
            get(municipalities_handler),
        )
        .route("/v1/buffers/preview", post(buffer_preview_handler))
        .route("/v1/buffers/create", post(buffer_create_handler))
        .route("/v1/nodes/upload", post(nodes_upload_handler))
        .route("/v1/nodes/filter", post(nodes_filter_handler))
        .route("/v1/polygons/buffer", post(polygon_buffer_handler))
        .route("/v1/projects/assemble", post(project_assemble_handler))
        .route("/v1/projects/generate", post(project_generate_handler))
        .route("/v1/features/edit", post(feature_edit_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("Starting server on {}", listen);

    let listener = tokio::net::TcpListener::bind(&listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Map core errors onto HTTP statuses: missing things are 404, bad input 400.
fn reject(err: AoiError) -> (StatusCode, String) {
    let status = match &err {
        AoiError::UnknownCountry(_)
        | AoiError::UnknownRegion { .. }
        | AoiError::UnknownMunicipality { .. }
        | AoiError::UnknownNodeSet(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_REQUEST,
    };
    (status, err.to_string())
}

fn collection_of(features: &[Feature]) -> Result<GeoJsonFeatureCollection, (StatusCode, String)> {
    GeoJsonFeatureCollection::from_features(features).map_err(reject)
}

/// Health check endpoint
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        countries: state.catalog.layer_countries().len(),
        node_sets: state.node_sets.len(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    countries: usize,
    node_sets: usize,
}

/// Countries with boundary layers available
async fn countries_handler(State(state): State<Arc<AppState>>) -> Json<Vec<CountryInfo>> {
    let countries = state
        .catalog
        .layer_countries()
        .into_iter()
        .map(|(code, name)| CountryInfo {
            code: code.to_string(),
            name: name.to_string(),
        })
        .collect();
    Json(countries)
}

#[derive(Serialize)]
struct CountryInfo {
    code: String,
    name: String,
}

/// Regions for a country, ordered by administrative code
async fn regions_handler(
    State(state): State<Arc<AppState>>,
    Path(country): Path<String>,
) -> Result<Json<Vec<RegionInfo>>, (StatusCode, String)> {
    let regions = state.catalog.regions_of(&country).map_err(reject)?;
    Ok(Json(
        regions
            .iter()
            .map(|r| RegionInfo {
                code: r.code.clone(),
                name: r.name.clone(),
            })
            .collect(),
    ))
}

#[derive(Serialize)]
struct RegionInfo {
    code: String,
    name: String,
}

/// Municipality names within a region, alphabetical
async fn municipalities_handler(
    State(state): State<Arc<AppState>>,
    Path((country, region)): Path<(String, String)>,
) -> Result<Json<MunicipalitiesResponse>, (StatusCode, String)> {
    let names = state
        .catalog
        .municipalities_of(&country, &region)
        .map_err(reject)?;
    Ok(Json(MunicipalitiesResponse {
        municipalities: names.into_iter().map(String::from).collect(),
    }))
}

#[derive(Serialize)]
struct MunicipalitiesResponse {
    municipalities: Vec<String>,
}

#[derive(Deserialize)]
struct BufferRequest {
    lat: f64,
    lon: f64,
    radii: Vec<u32>,
}

#[derive(Serialize)]
struct BufferPreviewResponse {
    geojson: GeoJsonFeatureCollection,
}

/// Buffer preview: one buffer feature per radius plus the center point
async fn buffer_preview_handler(
    State(_state): State<Arc<AppState>>,
    Json(req): Json<BufferRequest>,
) -> Result<Json<BufferPreviewResponse>, (StatusCode, String)> {
    let center = Point::new(req.lon, req.lat);
    let spec = BufferSpec::new(req.radii).map_err(reject)?;
    let mut features =
        build_buffers(&Geometry::Point(center), &spec, "AOI-1").map_err(reject)?;
    features.push(build_center_feature(center));

    Ok(Json(BufferPreviewResponse {
        geojson: collection_of(&features)?,
    }))
}

#[derive(Serialize)]
struct BufferCreateResponse {
    geojson: GeoJsonFeatureCollection,
    country_name: Option<String>,
}

/// Buffers with country tagging: the enclosing country boundary is prepended
/// as a periphery feature when the point resolves
async fn buffer_create_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BufferRequest>,
) -> Result<Json<BufferCreateResponse>, (StatusCode, String)> {
    let center = Point::new(req.lon, req.lat);
    let spec = BufferSpec::new(req.radii).map_err(reject)?;
    let buffers = build_buffers(&Geometry::Point(center), &spec, "AOI-1").map_err(reject)?;

    let mut features = Vec::with_capacity(buffers.len() + 1);
    let country_name = state.catalog.country_containing(center).map(|country| {
        features.push(Feature::new(
            "AOI-0",
            country.name.clone(),
            PolyType::Periphery,
            Geometry::MultiPolygon(country.geometry.clone()),
        ));
        country.name.clone()
    });
    features.extend(buffers);

    Ok(Json(BufferCreateResponse {
        geojson: collection_of(&features)?,
        country_name,
    }))
}

#[derive(Serialize)]
struct NodesUploadResponse {
    node_set_key: String,
    count: usize,
}

/// CSV node upload; builds the spatial index once and returns its key
async fn nodes_upload_handler(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<Json<NodesUploadResponse>, (StatusCode, String)> {
    let points = extract_coordinates(body.as_bytes()).map_err(reject)?;
    let count = points.len();
    let node_set_key = state.node_sets.insert(&points);
    info!(count, "node set uploaded");
    Ok(Json(NodesUploadResponse {
        node_set_key,
        count,
    }))
}

#[derive(Deserialize)]
struct NodesFilterRequest {
    node_set_key: Option<String>,
    /// Inline `[lat, lon]` pairs, for callers without an uploaded set
    nodes: Option<Vec<[f64; 2]>>,
    lat: f64,
    lon: f64,
    radius_m: f64,
}

#[derive(Serialize)]
struct NodesFilterResponse {
    filtered_points: Vec<[f64; 2]>,
    count: usize,
    buffer_geojson: GeoJsonFeature,
}

/// Points within a radius of a center, plus the buffer polygon used
async fn nodes_filter_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NodesFilterRequest>,
) -> Result<Json<NodesFilterResponse>, (StatusCode, String)> {
    let center = Point::new(req.lon, req.lat);

    let outcome = match (&req.node_set_key, &req.nodes) {
        (Some(key), _) => {
            nodes::filter_near(&state.node_sets, key, center, req.radius_m).map_err(reject)?
        }
        (None, Some(raw)) => {
            let points: Vec<(f64, f64)> = raw.iter().map(|p| (p[0], p[1])).collect();
            let index = NodeIndex::build(&points);
            nodes::filter_index(&index, center, req.radius_m).map_err(reject)?
        }
        (None, None) => {
            return Err((
                StatusCode::BAD_REQUEST,
                "either node_set_key or nodes is required".to_string(),
            ))
        }
    };

    let buffer_geojson = GeoJsonFeature::from_feature(&outcome.buffer).map_err(reject)?;
    Ok(Json(NodesFilterResponse {
        count: outcome.points.len(),
        filtered_points: outcome.points,
        buffer_geojson,
    }))
}

#[derive(Deserialize)]
struct PolygonBufferRequest {
    geometry: GeoJsonGeometry,
    distances: Vec<u32>,
}

#[derive(Serialize)]
struct PolygonBufferResponse {
    buffers: Vec<GeoJsonGeometry>,
}

/// Buffer a drawn polygon; output order matches the requested distances
async fn polygon_buffer_handler(
    State(_state): State<Arc<AppState>>,
    Json(req): Json<PolygonBufferRequest>,
) -> Result<Json<PolygonBufferResponse>, (StatusCode, String)> {
    // Validates range and duplicates; buffering below keeps request order.
    BufferSpec::new(req.distances.clone()).map_err(reject)?;
    let reference = req.geometry.to_geo().map_err(reject)?;

    let mut buffers = Vec::with_capacity(req.distances.len());
    for distance in &req.distances {
        let buffered = buffer_meters(&reference, f64::from(*distance)).map_err(reject)?;
        buffers.push(
            GeoJsonGeometry::from_geo(&Geometry::MultiPolygon(buffered)).map_err(reject)?,
        );
    }

    Ok(Json(PolygonBufferResponse { buffers }))
}

#[derive(Deserialize)]
struct ProjectAssembleRequest {
    features: Vec<GeoJsonFeature>,
    country_code: String,
    region_code: Option<String>,
    city_name: String,
}

#[derive(Serialize)]
struct ProjectResponse {
    geojson: GeoJsonFeatureCollection,
    filename: String,
    feature_count: usize,
}

/// Validate, uniquely identify, and package caller-supplied features
async fn project_assemble_handler(
    State(_state): State<Arc<AppState>>,
    Json(req): Json<ProjectAssembleRequest>,
) -> Result<Json<ProjectResponse>, (StatusCode, String)> {
    let features: Result<Vec<Feature>, _> =
        req.features.iter().map(|f| f.to_feature()).collect();
    let project = assemble(
        features.map_err(reject)?,
        &req.country_code,
        req.region_code.as_deref(),
        &req.city_name,
    )
    .map_err(reject)?;

    Ok(Json(ProjectResponse {
        geojson: project.geojson,
        filename: project.filename,
        feature_count: project.feature_count,
    }))
}

#[derive(Deserialize)]
struct ProjectGenerateRequest {
    country_code: String,
    region_code: String,
    city_name: String,
}

/// Full administrative project for a municipality
async fn project_generate_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProjectGenerateRequest>,
) -> Result<Json<ProjectResponse>, (StatusCode, String)> {
    let project = generate_project(
        &state.catalog,
        &req.country_code,
        &req.region_code,
        &req.city_name,
    )
    .map_err(reject)?;

    Ok(Json(ProjectResponse {
        geojson: project.geojson,
        filename: project.filename,
        feature_count: project.feature_count,
    }))
}

#[derive(Deserialize)]
struct FeatureEditRequest {
    feature: GeoJsonFeature,
    geometry: GeoJsonGeometry,
}

#[derive(Serialize)]
struct FeatureEditResponse {
    feature: GeoJsonFeature,
}

/// Swap a feature's geometry after a hand edit, keeping its properties
async fn feature_edit_handler(
    State(_state): State<Arc<AppState>>,
    Json(req): Json<FeatureEditRequest>,
) -> Result<Json<FeatureEditResponse>, (StatusCode, String)> {
    let original = req.feature.to_feature().map_err(reject)?;
    let edited = req.geometry.to_geo().map_err(reject)?;
    let merged = merge_edited_polygon(&original, edited).map_err(reject)?;
    Ok(Json(FeatureEditResponse {
        feature: GeoJsonFeature::from_feature(&merged).map_err(reject)?,
    }))
}

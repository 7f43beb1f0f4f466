use crate::api::registry_dto::RegistryDto;
use crate::api::request_dto::ClusterRequestDto;
use crate::api::reservation_dto::ClusterReservationDto;
use crate::domain::registry::registry::Registry;
use crate::domain::reservation::request::ClusterRequest;
use crate::domain::reservation::reservation::ClusterReservation;
use crate::error::Result;
use crate::loader::parser::parse_json_file;

pub mod api;
pub mod domain;
pub mod error;
pub mod loader;
pub mod logger;

/// Loads a registry document (nodes, aliases, groups and users) from a JSON file.
pub fn load_registry(file_path: &str) -> Result<Registry> {
    let dto: RegistryDto = parse_json_file(file_path)?;
    log::info!("Registry file '{}' parsed successfully.", file_path);

    Registry::try_from(dto)
}

/// Loads and validates a cluster request from a JSON file.
pub fn load_request(file_path: &str) -> Result<ClusterRequest> {
    let dto: ClusterRequestDto = parse_json_file(file_path)?;
    ClusterRequest::try_from(dto)
}

pub fn load_reservation(file_path: &str) -> Result<ClusterReservation> {
    let dto: ClusterReservationDto = parse_json_file(file_path)?;
    Ok(ClusterReservation::from(dto))
}

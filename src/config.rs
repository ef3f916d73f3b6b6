//! TOML configuration for the server and export binaries.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub global: GlobalConfig,
    /// Countries with region/municipality layers available.
    #[serde(default)]
    pub countries: Vec<CountryConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GlobalConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Directory holding the static boundary GeoJSON files.
    pub data_dir: PathBuf,
    /// World country boundaries, one feature per country, stored order kept.
    #[serde(default = "default_countries_file")]
    pub countries_file: String,
    /// Idle lifetime of an uploaded node set before eviction.
    #[serde(default = "default_node_set_ttl_secs")]
    pub node_set_ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CountryConfig {
    /// ISO-style code, e.g. "BR".
    pub code: String,
    pub name: String,
    pub regions_file: String,
    pub municipalities_file: String,
    /// Property keys in the boundary files; most datasets use the defaults.
    #[serde(default = "default_name_key")]
    pub region_name_key: String,
    #[serde(default = "default_code_key")]
    pub region_code_key: String,
    #[serde(default = "default_name_key")]
    pub municipality_name_key: String,
    #[serde(default = "default_region_key")]
    pub municipality_region_key: String,
}

fn default_listen() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_countries_file() -> String {
    "countries.geojson".to_string()
}

fn default_node_set_ttl_secs() -> u64 {
    1800
}

fn default_name_key() -> String {
    "name".to_string()
}

fn default_code_key() -> String {
    "code".to_string()
}

fn default_region_key() -> String {
    "region".to_string()
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
            [global]
            data_dir = "/var/lib/aoibox"

            [[countries]]
            code = "PT"
            name = "Portugal"
            regions_file = "distritos.geojson"
            municipalities_file = "concelhos.geojson"
            municipality_region_key = "distrito"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.global.listen, "0.0.0.0:3000");
        assert_eq!(config.global.node_set_ttl_secs, 1800);
        assert_eq!(config.countries.len(), 1);
        assert_eq!(config.countries[0].municipality_region_key, "distrito");
        assert_eq!(config.countries[0].region_code_key, "code");
    }
}

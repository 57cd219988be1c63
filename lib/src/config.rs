use std::net::SocketAddr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::client::hpp::HppOptions;
use crate::client::{ApiContext, Authorization, ServerRegion};
use crate::Result;

pub static CONFIG_FILE: &'static str = "klarna-checkout.toml";

/// Application configuration.
///
/// # Sensible defaults
///
/// Configuration provided through `Config::default()` points at the Klarna
/// playground in the European region and serves the storefront routes on
/// `127.0.0.1:8080`. Credentials are left empty and must be provided, usually
/// through the secret config file or the environment.
///
/// ```ignore
/// let cfg = Config {
///     klarna: Klarna {
///         username: "PK1234_abcd".to_string(),
///         password: "secret".to_string(),
///         ..Default::default()
///     },
///     ..Default::default()
/// }
/// ```
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub name: String,
    pub version: String,

    /// Domain name pointing to the machine running the storefront.
    pub domain: String,
    /// Public base url of the storefront, used for building callback urls
    /// handed over to Klarna as well as product and image urls. Defaults to
    /// `https://{domain}`.
    pub base_url: Option<String>,
    /// Page customers are taken to once they leave the checkout, paid or
    /// not. Defaults to the storefront base url.
    pub after_url: Option<String>,
    /// Address on which to serve the checkout routes. Defaults to
    /// `127.0.0.1:8080`.
    pub address: SocketAddr,

    pub tracing: Tracing,

    pub klarna: Klarna,
    pub product_images: ProductImages,
    pub hpp: Hpp,

    /// Path to the sled database directory.
    pub db_path: String,

    /// Development mode configuration.
    pub dev: DevMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            domain: "localhost".to_string(),
            base_url: None,
            after_url: None,
            address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            tracing: Tracing::default(),
            klarna: Klarna::default(),
            product_images: ProductImages::default(),
            hpp: Hpp::default(),
            db_path: "./db".to_string(),
            dev: DevMode::default(),
        }
    }
}

impl Config {
    pub fn base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}", self.domain),
        }
    }
}

/// Loads application config from toml file at default location.
pub fn load<T: DeserializeOwned>() -> Result<T> {
    load_from(CONFIG_FILE)
}

/// Loads application config from toml file at standard path using provided
/// name.
///
/// For example for `name` == `klarna-checkout.toml` we will load both
/// `klarna-checkout.toml` and `secret.klarna-checkout.toml` from the current
/// directory. Environment variables separated with `__` take precedence,
/// e.g. `__KLARNA__PASSWORD`.
pub fn load_from<T: DeserializeOwned>(name: impl AsRef<str>) -> Result<T> {
    let config = config::Config::builder()
        .add_source(config::File::with_name(name.as_ref()))
        .add_source(config::File::with_name(&format!("secret.{}", name.as_ref())).required(false))
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix_separator("__"),
        )
        .build()?;

    let config: T = config.try_deserialize()?;

    Ok(config)
}

/// Loads application config from multiple toml files at given paths.
pub fn load_from_many<T: DeserializeOwned>(paths: &[impl AsRef<str>]) -> Result<T> {
    let mut builder = config::Config::builder().add_source(
        config::Environment::default()
            .separator("__")
            .prefix_separator("__"),
    );

    for path in paths {
        builder = builder.add_source(config::File::with_name(path.as_ref()));
    }
    let config = builder.build()?;

    let config: T = config.try_deserialize()?;

    Ok(config)
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Tracing {
    pub enabled: bool,

    pub mode: crate::tracing::Mode,
    pub level: crate::tracing::Level,

    pub loki_address: String,
}

impl Default for Tracing {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: crate::tracing::Mode::default(),
            level: crate::tracing::Level::default(),
            loki_address: "".to_string(),
        }
    }
}

/// Klarna merchant credentials and environment.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Klarna {
    /// API username, e.g. `PK12345_a1b2c3d4e5f6`.
    pub username: String,
    pub password: String,
    pub region: ServerRegion,
    /// Use the playground (test) environment instead of production.
    pub playground: bool,
    /// Overrides the api base url derived from region and playground flag.
    pub api_url: Option<String>,
}

impl Default for Klarna {
    fn default() -> Self {
        Self {
            username: "".to_string(),
            password: "".to_string(),
            region: ServerRegion::Europe,
            playground: true,
            api_url: None,
        }
    }
}

impl Klarna {
    pub fn api_context(&self) -> ApiContext {
        ApiContext::new(
            Authorization::new(self.username.clone(), self.password.clone()),
            self.region,
            self.playground,
        )
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ProductImages {
    /// Type of the product image to send to Klarna. If the product has no
    /// image of this type the first image is used.
    pub r#type: String,
    /// Image cache filter applied to the image. If empty the original image
    /// is used.
    pub filter: String,
}

impl Default for ProductImages {
    fn default() -> Self {
        Self {
            r#type: "main".to_string(),
            filter: "sylius_medium".to_string(),
        }
    }
}

/// Hosted payment page customization.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Hpp {
    pub options: Option<HppOptions>,
    pub profile_id: Option<String>,
}

/// NOTE: make sure to disable on production.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DevMode {
    /// Global switch for all dev mode items.
    pub enabled: bool,
    /// Seed the database with a mock order and payment on startup.
    pub mock: bool,
}

//! HTTP client for the texture host, imagery proxy, and boundary service.

use image::DynamicImage;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::geometry::{self, BoundaryGeometry};

/// User agent for API requests.
const USER_AGENT: &str = "meteoglobe/0.1";

/// Base URL of the static planet texture set.
const TEXTURE_HOST: &str = "https://cdn.jsdelivr.net/gh/turban/webgl-earth/images";

/// Satellite composite refreshed by the imagery host every few minutes.
const SATELLITE_IMAGE_URL: &str =
    "https://rammb.cira.colostate.edu/repository/merged_imagery/latest_M1.jpg";

/// CORS-capable image proxy in front of the satellite host.
const IMAGE_PROXY: &str = "https://images.weserv.nl/?url=";

/// Boundary-geometry service (gbOpen release, national resolution).
const BOUNDARY_API: &str = "https://www.geoboundaries.org/api/current/gbOpen";

/// The fixed set of base planet textures loaded at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseTexture {
    /// Daylight surface color.
    Day,
    /// Emissive city lights for the night side.
    NightLights,
    /// Elevation bump map.
    Bump,
    /// Water/specular mask.
    Specular,
    /// Fallback cloud layer shown until live imagery arrives.
    CloudMask,
}

impl BaseTexture {
    /// Every texture in the batch, in load order.
    pub const ALL: [BaseTexture; 5] = [
        BaseTexture::Day,
        BaseTexture::NightLights,
        BaseTexture::Bump,
        BaseTexture::Specular,
        BaseTexture::CloudMask,
    ];

    /// URL of the texture on the static host.
    pub fn url(self) -> String {
        let file = match self {
            BaseTexture::Day => "2_no_clouds_4k.jpg",
            BaseTexture::NightLights => "night_lights_4k.jpg",
            BaseTexture::Bump => "elev_bump_4k.jpg",
            BaseTexture::Specular => "water_4k.png",
            BaseTexture::CloudMask => "fair_clouds_4k.png",
        };
        format!("{TEXTURE_HOST}/{file}")
    }

    /// Short name for logs.
    pub fn label(self) -> &'static str {
        match self {
            BaseTexture::Day => "day",
            BaseTexture::NightLights => "night-lights",
            BaseTexture::Bump => "bump",
            BaseTexture::Specular => "specular",
            BaseTexture::CloudMask => "cloud-mask",
        }
    }
}

/// Proxied satellite imagery URL with a cache-busting query parameter.
///
/// The imagery host republishes the same path, so the timestamp forces the
/// proxy and any intermediate caches to refetch.
pub fn cloud_imagery_url(timestamp_millis: u128) -> String {
    let target = format!("{SATELLITE_IMAGE_URL}?{timestamp_millis}");
    format!("{IMAGE_PROXY}{}", urlencoding::encode(&target))
}

/// Async HTTP client for all globe services.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// Create a client with default settings.
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self { http }
    }

    /// Fetch and decode one of the base planet textures.
    pub async fn fetch_texture(&self, texture: BaseTexture) -> Result<DynamicImage> {
        let url = texture.url();
        let bytes = self.fetch_bytes(&url).await?;
        image::load_from_memory(&bytes).map_err(|e| Error::Decode {
            context: "base texture",
            message: e.to_string(),
        })
    }

    /// Fetch the satellite cloud composite, streaming the body.
    ///
    /// `progress` is invoked with a 0-100 percentage as chunks arrive, but
    /// only when the response carries a content length; without one the
    /// download still proceeds silently.
    pub async fn fetch_cloud_imagery(
        &self,
        url: &str,
        mut progress: impl FnMut(f32),
    ) -> Result<DynamicImage> {
        let mut response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Http {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let total = response.content_length().filter(|len| *len > 0);
        let mut bytes: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| Error::Http {
            url: url.to_string(),
            message: e.to_string(),
        })? {
            bytes.extend_from_slice(&chunk);
            if let Some(total) = total {
                #[allow(clippy::cast_precision_loss)]
                progress((bytes.len() as f32 / total as f32 * 100.0).min(100.0));
            }
        }

        image::load_from_memory(&bytes).map_err(|e| Error::Decode {
            context: "cloud imagery",
            message: e.to_string(),
        })
    }

    /// Fetch the simplified national boundary for an ISO country code.
    ///
    /// The service is a two-step API: a metadata document per country, which
    /// links to the simplified-resolution GeoJSON download.
    pub async fn fetch_boundary(&self, country_code: &str) -> Result<BoundaryGeometry> {
        let code = country_code.to_uppercase();
        let meta_url = format!("{BOUNDARY_API}/{code}/ADM0/");
        let meta = self.fetch_json(&meta_url).await?;

        let geojson_url = meta
            .get("simplifiedGeometryGeoJSON")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Geometry {
                detail: format!("no simplified geometry link for {code}"),
            })?;

        let doc = self.fetch_json(geojson_url).await?;
        geometry::parse_geojson(&doc)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.http.get(url).send().await.map_err(|e| Error::Http {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        if !response.status().is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| Error::Http {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    async fn fetch_json(&self, url: &str) -> Result<Value> {
        let response = self.http.get(url).send().await.map_err(|e| Error::Http {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        if !response.status().is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        response.json().await.map_err(|e| Error::Http {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_urls_are_distinct() {
        let urls: Vec<String> = BaseTexture::ALL.iter().map(|t| t.url()).collect();
        for (i, url) in urls.iter().enumerate() {
            assert!(url.starts_with(TEXTURE_HOST));
            assert!(!urls[i + 1..].contains(url));
        }
    }

    #[test]
    fn test_cloud_imagery_url_is_proxied_and_busted() {
        let url = cloud_imagery_url(1_700_000_000_000);
        assert!(url.starts_with(IMAGE_PROXY));
        // The target URL, including the timestamp, must be encoded.
        assert!(url.contains("1700000000000"));
        assert!(!url[IMAGE_PROXY.len()..].contains("://"));
    }

    #[test]
    fn test_distinct_timestamps_give_distinct_urls() {
        assert_ne!(cloud_imagery_url(1), cloud_imagery_url(2));
    }
}

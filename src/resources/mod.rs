//! Thin asset I/O at the edge of the engine.
//!
//! Files are read from the asset directory on native targets and fetched
//! relative to the page origin on the web. Loader failures are reported as
//! `anyhow` errors; the engine wraps them when they cross its API.

pub mod mesh;
pub mod texture;

pub use mesh::{load_obj, obj_to_assets};
pub use texture::{load_cubemap, load_texture};

/// Directory holding the assets copied by the build script. Overridable at
/// run time through `LUMEN_ASSETS`.
#[cfg(not(target_arch = "wasm32"))]
fn asset_path(file_name: &str) -> std::path::PathBuf {
    let root = std::env::var("LUMEN_ASSETS")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from(env!("LUMEN_ASSET_DIR")));
    root.join(file_name)
}

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().ok_or_else(|| anyhow::anyhow!("no window"))?;
    let origin = window
        .location()
        .origin()
        .map_err(|_| anyhow::anyhow!("page origin unavailable"))?;
    let base = reqwest::Url::parse(&format!("{origin}/assets/"))?;
    Ok(base.join(file_name)?)
}

pub async fn load_string(file_name: &str) -> anyhow::Result<String> {
    #[cfg(target_arch = "wasm32")]
    let txt = {
        let url = format_url(file_name)?;
        reqwest::get(url).await?.text().await?
    };
    #[cfg(not(target_arch = "wasm32"))]
    let txt = std::fs::read_to_string(asset_path(file_name))?;

    Ok(txt)
}

pub async fn load_binary(file_name: &str) -> anyhow::Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(file_name)?;
        reqwest::get(url).await?.bytes().await?.to_vec()
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = std::fs::read(asset_path(file_name))?;

    Ok(data)
}

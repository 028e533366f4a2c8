use super::*;
use std::fs;
use std::io::Read;
use std::time::Duration;

use flate2::read::GzDecoder;
use tempfile::TempDir;

use crate::freshness::{digest_bytes, mtime::secs};
use crate::processor::FnProcessor;

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01";

fn fixture() -> (TempDir, Environment) {
    let dir = TempDir::new().unwrap();
    let assets = dir.path().join("assets");
    fs::create_dir_all(assets.join("lib")).unwrap();
    fs::write(assets.join("logo.png"), PNG).unwrap();
    fs::write(assets.join("lib/util.js"), "util()\n").unwrap();
    fs::write(
        assets.join("application.js"),
        "//= require lib/util\n\napp()\n",
    )
    .unwrap();

    let env = Environment::new(dir.path());
    env.append_path("assets");
    (dir, env)
}

fn set_mtime(path: &Path, mtime: SystemTime) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(mtime)
        .unwrap();
}

// ============================================================================
// StaticAsset
// ============================================================================

#[test]
fn test_static_asset() {
    let (dir, env) = fixture();
    let asset = env.get("logo.png").unwrap().unwrap();
    let pathname = dir.path().join("assets/logo.png");

    assert_eq!(asset.class(), AssetClass::StaticAsset);
    assert_eq!(asset.logical_path(), "logo.png");
    assert_eq!(asset.pathname(), pathname);
    assert_eq!(asset.content_type(), "image/png");
    assert_eq!(asset.length(), PNG.len() as u64);
    assert_eq!(Some(asset.digest().to_string()), env.file_digest(&pathname));
    assert!(asset.dependencies().is_empty());
    assert_eq!(asset.to_bytes().unwrap(), PNG);

    let list = asset.to_list();
    assert_eq!(list.len(), 1);
    assert!(Arc::ptr_eq(&list[0], &asset));
}

#[test]
fn test_static_asset_touched_but_unchanged_is_fresh() {
    let (dir, env) = fixture();
    let pathname = dir.path().join("assets/logo.png");
    let asset = env.get("logo.png").unwrap().unwrap();

    set_mtime(&pathname, asset.mtime() + Duration::from_secs(60));
    assert!(asset.is_fresh(&env));

    fs::write(&pathname, b"GIF89a").unwrap();
    assert!(asset.is_stale(&env));
}

// ============================================================================
// ProcessedAsset / BundledAsset
// ============================================================================

#[test]
fn test_processed_asset() {
    let (_dir, env) = fixture();
    let asset = env.find_asset("lib/util.js", false).unwrap().unwrap();

    let Asset::Processed(processed) = asset.as_ref() else {
        panic!("expected a processed asset, got {}", asset.class_name());
    };
    assert_eq!(processed.source(), "util();\n");
    assert_eq!(asset.length(), processed.source().len() as u64);
    assert_eq!(asset.digest(), digest_bytes(&env.digest(), processed.source()));
    assert_eq!(asset.content_type(), "application/javascript");
}

#[test]
fn test_bundled_asset_concatenates_requires() {
    let (dir, env) = fixture();
    let asset = env.get("application.js").unwrap().unwrap();
    assert_eq!(asset.class(), AssetClass::BundledAsset);

    let parts = asset.to_list();
    let logical: Vec<_> = parts.iter().map(|a| a.logical_path()).collect();
    assert_eq!(logical, ["lib/util.js", "application.js"]);
    assert!(parts.iter().all(|a| a.class() == AssetClass::ProcessedAsset));

    let body: String = parts.iter().map(|a| a.body().unwrap().into_owned()).collect();
    assert_eq!(asset.to_string_lossy().unwrap(), body);
    assert!(body.starts_with("util();\n"));
    assert!(body.ends_with("app();\n"));

    assert_eq!(
        asset.dependencies(),
        vec![dir.path().join("assets/lib/util.js")]
    );
}

#[test]
fn test_bundle_processors_see_concatenation() {
    let (_dir, env) = fixture();
    let banner = FnProcessor::new("banner", |_, data: String| Ok(format!("/* bundle */\n{data}")));
    env.register_bundle_processor("application/javascript", Arc::new(banner), None);

    let bundled = env.get("application.js").unwrap().unwrap();
    let processed = env.find_asset("application.js", false).unwrap().unwrap();

    assert!(bundled.to_string_lossy().unwrap().starts_with("/* bundle */\nutil();"));
    assert!(!processed.to_string_lossy().unwrap().contains("/* bundle */"));
}

// ============================================================================
// Output
// ============================================================================

#[test]
fn test_write_to() {
    let (dir, env) = fixture();
    let asset = env.get("application.js").unwrap().unwrap();
    let target = dir.path().join("public/js/application.js");

    asset.write_to(&target).unwrap();
    assert_eq!(
        fs::read_to_string(&target).unwrap(),
        asset.to_string_lossy().unwrap()
    );
    let written = fs::metadata(&target).unwrap().modified().unwrap();
    assert_eq!(secs(written), secs(asset.mtime()));
    assert!(!dir.path().join("public/js/application.js+").exists());
}

#[test]
fn test_write_to_gzip() {
    let (dir, env) = fixture();
    let asset = env.get("logo.png").unwrap().unwrap();
    let target = dir.path().join("public/logo.png.gz");

    asset.write_to(&target).unwrap();

    let mut decoded = Vec::new();
    GzDecoder::new(File::open(&target).unwrap())
        .read_to_end(&mut decoded)
        .unwrap();
    assert_eq!(decoded, PNG);
}

// ============================================================================
// Records and equality
// ============================================================================

#[test]
fn test_record_round_trip() {
    let (_dir, env) = fixture();

    for (path, bundle) in [("logo.png", true), ("lib/util.js", false), ("application.js", true)] {
        let asset = env.find_asset(path, bundle).unwrap().unwrap();
        let json = serde_json::to_vec(&asset.encode(&env)).unwrap();
        let record: AssetRecord = serde_json::from_slice(&json).unwrap();
        let restored = Asset::from_record(&env, record).unwrap();

        assert_eq!(restored, *asset, "{path}");
        assert_eq!(restored.length(), asset.length());
        assert_eq!(restored.content_type(), asset.content_type());
        assert!(restored.is_fresh(&env), "{path}");
        assert_eq!(restored.dependency_files(), asset.dependency_files());
        assert_eq!(restored.required_paths(), asset.required_paths());
        assert_eq!(restored.to_bytes().unwrap(), asset.to_bytes().unwrap());
    }
}

#[test]
fn test_bundle_record_rejected_after_dependency_change() {
    let (dir, env) = fixture();
    let asset = env.get("application.js").unwrap().unwrap();
    let record = asset.encode(&env);

    fs::write(dir.path().join("assets/lib/util.js"), "changed()\n").unwrap();

    let err = Asset::from_record(&env, record).unwrap_err();
    assert!(matches!(err, Error::CacheCorruption(_)), "{err}");
}

#[test]
fn test_equality() {
    let (_dir, env) = fixture();
    let bundled = env.get("application.js").unwrap().unwrap();
    let processed = env.find_asset("application.js", false).unwrap().unwrap();

    assert_eq!(*bundled, *env.get("application.js").unwrap().unwrap());
    assert_ne!(*bundled, *processed);
}

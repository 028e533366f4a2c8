use super::*;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use tempfile::TempDir;

use crate::error::Error;
use crate::freshness::hex_digest;
use crate::processor::FnProcessor;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new(files: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().unwrap();
        let fixture = Self { dir };
        for (path, content) in files {
            fixture.write(path, content);
        }
        fixture
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join("assets").join(relative)
    }

    fn write(&self, relative: &str, content: &str) {
        let path = self.path(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn set_mtime(&self, relative: &str, mtime: SystemTime) {
        File::options()
            .write(true)
            .open(self.path(relative))
            .unwrap()
            .set_modified(mtime)
            .unwrap();
    }

    fn env(&self) -> Environment {
        let env = Environment::new(self.dir.path());
        env.append_path("assets");
        env
    }
}

fn compile(env: &Environment, path: &str) -> String {
    env.compile(path).unwrap()
}

// ============================================================================
// Lookup
// ============================================================================

#[test]
fn test_resolve_and_bare_name() {
    let fx = Fixture::new(&[("application.js", "app()\n")]);
    let env = fx.env();

    assert_eq!(env.resolve("application.js").unwrap(), fx.path("application.js"));

    let asset = env.get("application").unwrap().unwrap();
    assert_eq!(asset.logical_path(), "application.js");
    assert_eq!(asset.pathname(), fx.path("application.js"));
}

#[test]
fn test_find_asset_by_absolute_path() {
    let fx = Fixture::new(&[("lib/util.js", "util()\n")]);
    let env = fx.env();

    let asset = env.find_asset(fx.path("lib/util.js"), true).unwrap().unwrap();
    assert_eq!(asset.logical_path(), "lib/util.js");
    assert!(env.find_asset(fx.path("lib/missing.js"), true).unwrap().is_none());
}

#[test]
fn test_missing_asset() {
    let fx = Fixture::new(&[]);
    let env = fx.env();

    assert!(env.find_asset("missing.js", true).unwrap().is_none());
    assert!(env.compile("missing.js").unwrap_err().is_not_found());
    assert!(env.resolve("missing.js").unwrap_err().is_not_found());
}

#[test]
fn test_lookup_is_idempotent() {
    let fx = Fixture::new(&[("application.js", "app()\n")]);
    let env = fx.env();

    let first = env.get("application.js").unwrap().unwrap();
    let second = env.get("application.js").unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    // Same asset through its physical path
    let by_path = env.get(fx.path("application.js")).unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &by_path));
}

#[test]
fn test_first_root_shadows_later() {
    let fx = Fixture::new(&[("app.js", "first()\n")]);
    fs::create_dir_all(fx.dir.path().join("vendor")).unwrap();
    fs::write(fx.dir.path().join("vendor/app.js"), "second()\n").unwrap();
    let env = fx.env();
    env.append_path("vendor");

    assert_eq!(compile(&env, "app.js"), "first();\n");

    env.clear_paths();
    env.prepend_path("assets");
    env.prepend_path("vendor");
    assert_eq!(env.paths()[0], fx.dir.path().join("vendor"));
    assert_eq!(compile(&env, "app.js"), "second();\n");
}

#[test]
fn test_engine_extensions() {
    let fx = Fixture::new(&[("shout.js.upper", "hello()\n"), ("loud.upper", "hey()\n")]);
    let env = fx.env();
    let upper = FnProcessor::new("upper", |_, data: String| Ok(data.to_uppercase()))
        .with_mime_type("application/javascript");
    env.register_engine(".upper", Arc::new(upper));

    let shout = env.get("shout.js").unwrap().unwrap();
    assert_eq!(shout.content_type(), "application/javascript");
    assert_eq!(shout.to_string_lossy().unwrap(), "HELLO();\n");

    // Engine standing in for the format extension
    let loud = env.get("loud.js").unwrap().unwrap();
    assert_eq!(loud.logical_path(), "loud.js");
    assert_eq!(loud.to_string_lossy().unwrap(), "HEY();\n");
}

// ============================================================================
// Directives
// ============================================================================

#[test]
fn test_require_directory_and_tree() {
    let fx = Fixture::new(&[
        ("dir.js", "//= require_directory ./lib\n"),
        ("tree.js", "//= require_tree ./lib\n"),
        ("lib/a.js", "a()\n"),
        ("lib/b.js", "b()\n"),
        ("lib/styles.css", "body {}\n"),
        ("lib/nested/c.js", "c()\n"),
    ]);
    let env = fx.env();

    let logical = |path: &str| -> Vec<String> {
        env.get(path)
            .unwrap()
            .unwrap()
            .to_list()
            .iter()
            .map(|a| a.logical_path().to_string())
            .collect()
    };

    assert_eq!(logical("dir.js"), ["lib/a.js", "lib/b.js", "dir.js"]);
    assert_eq!(
        logical("tree.js"),
        ["lib/a.js", "lib/b.js", "lib/nested/c.js", "tree.js"]
    );
}

#[test]
fn test_stub_excludes_requires() {
    let fx = Fixture::new(&[
        ("app.js", "//= require lib/a\n//= require lib/b\n//= stub lib/a\n"),
        ("lib/a.js", "a()\n"),
        ("lib/b.js", "//= require ./a\nb()\n"),
    ]);
    let env = fx.env();

    let parts: Vec<_> = env
        .get("app.js")
        .unwrap()
        .unwrap()
        .to_list()
        .iter()
        .map(|a| a.logical_path().to_string())
        .collect();
    assert_eq!(parts, ["lib/b.js", "app.js"]);
}

#[test]
fn test_require_rejects_other_content_type() {
    let fx = Fixture::new(&[("app.js", "//= require site.css\n"), ("site.css", "body {}\n")]);
    let env = fx.env();

    let err = env.get("app.js").unwrap_err();
    assert!(matches!(err, Error::InvalidRequire { .. }), "{err}");
}

#[test]
fn test_directive_argument_error() {
    let fx = Fixture::new(&[("app.js", "// a comment\n//= require a b\n")]);
    let env = fx.env();

    match env.get("app.js").unwrap_err() {
        Error::Directive { line, message, .. } => {
            assert_eq!(line, 2);
            assert!(message.contains("exactly one argument"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_banner_comment_in_header() {
    let fx = Fixture::new(&[
        ("app.js", "// ==== Utilities ====\n//= require util\napp()\n"),
        ("util.js", "util()\n"),
    ]);
    let env = fx.env();

    assert_eq!(
        compile(&env, "app.js"),
        "util();\n// ==== Utilities ====\n\napp();\n"
    );
}

#[test]
fn test_absolute_require_checks_content_type() {
    let fx = Fixture::new(&[("lib/style.css", "body { color: red }\n")]);
    fx.write(
        "app.js",
        &format!("//= require {}\napp()\n", fx.path("lib/style.css").display()),
    );
    fx.write(
        "dir.js",
        &format!("//= require {}\n", fx.path("lib").display()),
    );
    let env = fx.env();

    let err = env.compile("app.js").unwrap_err();
    assert!(matches!(err, Error::InvalidRequire { .. }), "{err}");

    let err = env.compile("dir.js").unwrap_err();
    assert!(matches!(err, Error::InvalidRequire { .. }), "{err}");
}

#[test]
fn test_circular_require() {
    let fx = Fixture::new(&[("a.js", "//= require b\na()\n"), ("b.js", "//= require a\nb()\n")]);
    let env = fx.env();

    let err = env.get("a.js").unwrap_err();
    assert!(matches!(err, Error::CircularDependency(_)), "{err}");
}

// ============================================================================
// Freshness
// ============================================================================

#[test]
fn test_required_file_change_makes_bundle_stale() {
    let fx = Fixture::new(&[("app.js", "//= require util\napp()\n"), ("util.js", "util()\n")]);
    let env = fx.env();

    let asset = env.get("app.js").unwrap().unwrap();
    assert!(asset.is_fresh(&env));

    // Content change alone, mtime restored
    let mtime = fs::metadata(fx.path("util.js")).unwrap().modified().unwrap();
    fx.write("util.js", "util2()\n");
    fx.set_mtime("util.js", mtime);
    assert!(asset.is_stale(&env));

    let rebuilt = env.get("app.js").unwrap().unwrap();
    assert!(!Arc::ptr_eq(&asset, &rebuilt));
    assert!(rebuilt.to_string_lossy().unwrap().starts_with("util2();"));
}

#[test]
fn test_transitive_require_change() {
    let fx = Fixture::new(&[
        ("a.js", "//= require b\n"),
        ("b.js", "//= require c\n"),
        ("c.js", "c()\n"),
    ]);
    let env = fx.env();

    let asset = env.get("a.js").unwrap().unwrap();
    fx.write("c.js", "c2()\n");
    assert!(asset.is_stale(&env));
    assert!(compile(&env, "a.js").starts_with("c2();"));
}

#[test]
fn test_depend_on_tracks_mtime_only() {
    let fx = Fixture::new(&[("app.js", "//= depend_on data.json\napp()\n"), ("data.json", "{}")]);
    let past = SystemTime::now() - Duration::from_secs(100);
    fx.set_mtime("data.json", past);
    let env = fx.env();

    let asset = env.get("app.js").unwrap().unwrap();
    assert!(asset.dependencies().is_empty());

    // Same mtime, new content
    fx.write("data.json", "{\"a\": 1}");
    fx.set_mtime("data.json", past);
    assert!(asset.is_fresh(&env));

    fx.set_mtime("data.json", past + Duration::from_secs(10));
    assert!(asset.is_stale(&env));
}

#[test]
fn test_depend_on_asset_tracks_content() {
    let fx = Fixture::new(&[
        ("app.js", "//= depend_on_asset lib/util.js\napp()\n"),
        ("lib/util.js", "util()\n"),
    ]);
    let env = fx.env();

    let asset = env.get("app.js").unwrap().unwrap();
    assert_eq!(asset.to_list().len(), 1);

    let mtime = fs::metadata(fx.path("lib/util.js")).unwrap().modified().unwrap();
    fx.write("lib/util.js", "changed()\n");
    fx.set_mtime("lib/util.js", mtime);
    assert!(asset.is_stale(&env));
}

#[test]
fn test_removed_dependency() {
    let fx = Fixture::new(&[("app.js", "//= require util\napp()\n"), ("util.js", "util()\n")]);
    let env = fx.env();

    let asset = env.get("app.js").unwrap().unwrap();
    fs::remove_file(fx.path("util.js")).unwrap();

    assert!(asset.is_stale(&env));
    let err = env.get("app.js").unwrap_err();
    assert!(matches!(err, Error::InvalidRequire { .. }), "{err}");
}

#[test]
fn test_new_file_in_required_tree() {
    let fx = Fixture::new(&[("app.js", "//= require_tree ./lib\n"), ("lib/a.js", "a()\n")]);
    let env = fx.env();

    let asset = env.get("app.js").unwrap().unwrap();
    assert!(asset.is_fresh(&env));

    fx.write("lib/deep/b.js", "b()\n");
    assert!(asset.is_stale(&env));
    assert_eq!(env.get("app.js").unwrap().unwrap().to_list().len(), 3);
}

// ============================================================================
// Registry mutation and digests
// ============================================================================

#[test]
fn test_mutation_changes_digest_and_expires_assets() {
    let fx = Fixture::new(&[("app.js", "app()\n")]);
    let env = fx.env();

    let seed = hex_digest(&env.digest());
    assert_eq!(seed, hex_digest(&env.digest()));
    let before = env.get("app.js").unwrap().unwrap();

    env.set_version("2.0");
    assert_eq!(env.version(), "2.0");
    assert_ne!(seed, hex_digest(&env.digest()));

    let after = env.get("app.js").unwrap().unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_ne!(before.digest(), after.digest());
    assert_eq!(before.to_bytes().unwrap(), after.to_bytes().unwrap());
}

#[test]
fn test_unregister_processor() {
    let fx = Fixture::new(&[("app.js", "app()")]);
    let env = fx.env();
    assert_eq!(compile(&env, "app.js"), "app();\n");

    assert!(env.unregister_postprocessor("application/javascript", "safety_colons"));
    assert!(!env.unregister_postprocessor("application/javascript", "safety_colons"));
    assert_eq!(compile(&env, "app.js"), "app()\n");
}

#[test]
fn test_processor_callback() {
    let fx = Fixture::new(&[("app.js", "app()\n")]);
    let env = fx.env();
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    let callback: crate::processor::Callback = Arc::new(move |context: &crate::Context<'_>, output: &str| {
        sink.lock().push((context.logical_path().to_string(), output.to_string()));
    });
    let identity = FnProcessor::new("identity", |_, data: String| Ok(data));
    env.register_postprocessor("application/javascript", Arc::new(identity), Some(callback));

    compile(&env, "app.js");
    assert_eq!(*seen.lock(), vec![("app".to_string(), "app();\n".to_string())]);
}

#[test]
fn test_file_digest_of_directory() {
    let fx = Fixture::new(&[("lib/a.js", "")]);
    let env = fx.env();

    let before = env.file_digest(fx.path("lib")).unwrap();
    fx.write("lib/b.js", "");
    assert_ne!(before, env.file_digest(fx.path("lib")).unwrap());
    assert!(env.file_digest(fx.path("missing")).is_none());
}

// ============================================================================
// External cache
// ============================================================================

fn cached_env(fx: &Fixture, store: &Arc<MemoryStore>, builds: &Arc<AtomicUsize>) -> Environment {
    let env = Environment::new(fx.dir.path()).with_cache(Arc::clone(store) as Arc<dyn CacheStore>);
    env.append_path("assets");
    let counter = Arc::clone(builds);
    let counting = FnProcessor::new("counting", move |_, data: String| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(data)
    });
    env.register_preprocessor("application/javascript", Arc::new(counting), None);
    env
}

#[test]
fn test_external_cache_reused_across_environments() {
    let fx = Fixture::new(&[("app.js", "//= require util\napp()\n"), ("util.js", "util()\n")]);
    let store = Arc::new(MemoryStore::new());
    let builds = Arc::new(AtomicUsize::new(0));

    let first = cached_env(&fx, &store, &builds);
    let built = first.get("app.js").unwrap().unwrap();
    let count = builds.load(Ordering::SeqCst);
    assert!(count > 0);
    assert!(!store.is_empty());

    let second = cached_env(&fx, &store, &builds);
    let restored = second.get("app.js").unwrap().unwrap();
    assert_eq!(builds.load(Ordering::SeqCst), count);
    assert_eq!(*restored, *built);
    assert_eq!(restored.to_bytes().unwrap(), built.to_bytes().unwrap());

    // Another configuration never reads the old entries
    let third = cached_env(&fx, &store, &builds);
    third.set_version("2.0");
    third.get("app.js").unwrap().unwrap();
    assert!(builds.load(Ordering::SeqCst) > count);
}

#[test]
fn test_external_cache_entry_stale_after_edit() {
    let fx = Fixture::new(&[("app.js", "app()\n")]);
    let store = Arc::new(MemoryStore::new());
    let builds = Arc::new(AtomicUsize::new(0));

    cached_env(&fx, &store, &builds).get("app.js").unwrap();
    fx.write("app.js", "edited()\n");

    let env = cached_env(&fx, &store, &builds);
    assert_eq!(compile(&env, "app.js"), "edited();\n");
}

#[test]
fn test_file_store_from_config() {
    let fx = Fixture::new(&[("app.js", "app()\n")]);
    let config_path = fx.dir.path().join("rivets.toml");
    fs::write(&config_path, "paths = ['assets']\nversion = '1.0'\n").unwrap();

    let config = RivetsConfig::from_path(&config_path).unwrap();
    let env = Environment::from_config(&config);
    assert!(env.has_cache());
    assert_eq!(env.version(), "1.0");
    assert_eq!(env.paths(), vec![fx.path("")]);

    compile(&env, "app.js");
    let cache_dir = fx.dir.path().join(".rivets/cache/rivets");
    assert!(fs::read_dir(cache_dir).unwrap().next().is_some());
}

// ============================================================================
// Logical path enumeration
// ============================================================================

#[test]
fn test_each_logical_path() {
    let fx = Fixture::new(&[
        ("app.js", ""),
        ("lib/util.js", ""),
        ("site.css", ""),
        ("widgets/index.js", ""),
        (".hidden.js", ""),
    ]);
    let env = fx.env();

    let all: Vec<String> = env.each_logical_path(Vec::new()).map(|(lp, _)| lp).collect();
    assert_eq!(all, ["app.js", "lib/util.js", "site.css", "widgets/index.js"]);

    let filters = vec![
        PathFilter::glob("*.css").unwrap(),
        PathFilter::regex(r"^lib/").unwrap(),
    ];
    let some: Vec<String> = env.each_logical_path(filters).map(|(lp, _)| lp).collect();
    assert_eq!(some, ["lib/util.js", "site.css"]);

    // `widgets/index.js` passes as `widgets.js`
    let aliased: Vec<(String, PathBuf)> = env
        .each_logical_path(vec![PathFilter::predicate(|lp, _| lp == "widgets.js")])
        .collect();
    assert_eq!(
        aliased,
        [("widgets.js".to_string(), fx.path("widgets/index.js"))]
    );
}

#[test]
fn test_each_logical_path_shadowed_once() {
    let fx = Fixture::new(&[("app.js", "")]);
    fs::create_dir_all(fx.dir.path().join("vendor")).unwrap();
    fs::write(fx.dir.path().join("vendor/app.js"), "").unwrap();
    fs::write(fx.dir.path().join("vendor/extra.js"), "").unwrap();
    let env = fx.env();
    env.append_path("vendor");

    let paths: Vec<(String, PathBuf)> = env.each_logical_path(Vec::new()).collect();
    assert_eq!(
        paths,
        [
            ("app.js".to_string(), fx.path("app.js")),
            ("extra.js".to_string(), fx.dir.path().join("vendor/extra.js")),
        ]
    );
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_lookups() {
    let fx = Fixture::new(&[
        ("app.js", "//= require_tree ./lib\n"),
        ("lib/a.js", "a()\n"),
        ("lib/b.js", "b()\n"),
    ]);
    let env = fx.env();
    let expected = fx.env().compile("app.js").unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let env = &env;
                scope.spawn(move || {
                    if i % 2 == 0 {
                        env.compile("app.js").unwrap()
                    } else {
                        env.get("lib/a.js").unwrap().unwrap();
                        env.compile("app.js").unwrap()
                    }
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

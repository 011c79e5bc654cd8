use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use tracing_subscriber::EnvFilter;
use war_overlay::{CacheLoad, Error, WarBuilder, WebappStructure, CURRENT_BUILD_ID};
use war_project::{Dependency, OverlayConfig, Resource, WarConfig, WarProject};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn write_archive(path: &Utf8Path, entries: &[(&str, &str)]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    for (name, contents) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(contents.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

fn write(path: &Utf8Path, contents: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

fn overlay(artifact_id: &str) -> OverlayConfig {
    OverlayConfig {
        group_id: Some("g".to_string()),
        artifact_id: Some(artifact_id.to_string()),
        ..OverlayConfig::default()
    }
}

fn project(root: &Utf8Path, dependencies: Vec<Dependency>, war: WarConfig) -> WarProject {
    WarProject {
        group_id: "g".to_string(),
        artifact_id: "shop".to_string(),
        version: "1.0".to_string(),
        final_name: None,
        properties: [("app.title".to_string(), "Shop".to_string())].into(),
        dependencies,
        war,
        basedir: root.to_path_buf(),
    }
}

/// Two skins that both ship `index.jsp`.
fn skins(root: &Utf8Path) -> Vec<Dependency> {
    let skin_a = root.join("repo/skin-a-1.0.war");
    let skin_b = root.join("repo/skin-b-1.0.war");
    write_archive(
        &skin_a,
        &[("index.jsp", "skin a"), ("css/a.css", "a")],
    );
    write_archive(
        &skin_b,
        &[
            ("META-INF/MANIFEST.MF", "Manifest-Version: 1.0\r\n"),
            ("index.jsp", "skin b"),
            ("css/b.css", "b"),
        ],
    );
    vec![
        Dependency::new("g", "skin-a", "1.0", "war").with_file(skin_a),
        Dependency::new("g", "skin-b", "1.0", "war").with_file(skin_b),
    ]
}

fn snapshot(dir: &Utf8Path) -> BTreeMap<String, Vec<u8>> {
    walkdir::WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .map(|entry| entry.unwrap())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let relative = entry.path().strip_prefix(dir).unwrap();
            (
                relative.to_string_lossy().replace('\\', "/"),
                std::fs::read(entry.path()).unwrap(),
            )
        })
        .collect()
}

#[test]
fn test_first_overlay_wins() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();

    let project = project(
        root,
        skins(root),
        WarConfig {
            overlays: vec![overlay("skin-a"), overlay("skin-b")],
            ..WarConfig::default()
        },
    );
    let result = WarBuilder::new(&project).explode().unwrap();
    let webapp = &result.webapp_directory;

    assert_eq!(std::fs::read_to_string(webapp.join("index.jsp")).unwrap(), "skin a");
    assert!(webapp.join("css/a.css").exists());
    assert!(webapp.join("css/b.css").exists());
    assert!(!webapp.join("META-INF/MANIFEST.MF").exists());
    assert_eq!(result.structure.get_owner("index.jsp"), Some("g:skin-a"));
    assert_eq!(result.structure.get_owner("css/b.css"), Some("g:skin-b"));
    assert_eq!(result.unpacked, 2);
}

#[test]
fn test_current_project_always_wins() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();
    write(&root.join("src/main/webapp/index.jsp"), "project");

    // The current project is placed last, after both skins.
    let project = project(
        root,
        skins(root),
        WarConfig {
            overlays: vec![overlay("skin-a"), overlay("skin-b"), OverlayConfig::default()],
            ..WarConfig::default()
        },
    );
    let result = WarBuilder::new(&project).explode().unwrap();

    assert_eq!(result.overlays, vec!["g:skin-a", "g:skin-b", CURRENT_BUILD_ID]);
    assert_eq!(
        std::fs::read_to_string(result.webapp_directory.join("index.jsp")).unwrap(),
        "project"
    );
    assert_eq!(result.structure.get_owner("index.jsp"), Some(CURRENT_BUILD_ID));
}

#[test]
fn test_duplicate_overlay_id_writes_nothing() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();

    let project = project(
        root,
        skins(root),
        WarConfig {
            overlays: vec![overlay("skin-a"), overlay("skin-a")],
            ..WarConfig::default()
        },
    );
    let result = WarBuilder::new(&project).explode();

    assert!(matches!(result, Err(Error::DuplicateOverlayId(id)) if id == "g:skin-a"));
    assert!(!project.build_directory().as_std_path().exists());
}

#[test]
fn test_implicit_overlays_and_libraries() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();

    let library = root.join("repo/util-2.0.jar");
    write_archive(&library, &[("com/example/Util.class", "class")]);
    let mut dependencies = skins(root);
    dependencies.push(Dependency::new("g", "util", "2.0", "jar").with_file(library));

    let project = project(
        root,
        dependencies,
        WarConfig {
            overlays: vec![overlay("skin-b")],
            overlay_types: vec!["war".to_string()],
            ..WarConfig::default()
        },
    );
    let result = WarBuilder::new(&project).explode().unwrap();

    assert_eq!(result.overlays, vec![CURRENT_BUILD_ID, "g:skin-b", "g:skin-a"]);
    assert_eq!(
        std::fs::read_to_string(result.webapp_directory.join("index.jsp")).unwrap(),
        "skin b"
    );
    assert!(result.webapp_directory.join("WEB-INF/lib/util-2.0.jar").is_file());
    assert!(!result.webapp_directory.join("com/example/Util.class").exists());
}

#[test]
fn test_changed_dependencies_invalidate_cache() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();

    let library = root.join("repo/util-1.0.jar");
    write_archive(&library, &[("com/example/Util.class", "v1")]);
    let skin_a = skins(root).remove(0);
    let war = WarConfig {
        use_cache: true,
        overlay_types: vec!["war".to_string()],
        ..WarConfig::default()
    };

    let first = project(
        root,
        vec![
            skin_a,
            Dependency::new("g", "util", "1.0", "jar").with_file(library),
        ],
        war.clone(),
    );
    let result = WarBuilder::new(&first).explode().unwrap();
    let webapp = result.webapp_directory;
    assert!(webapp.join("css/a.css").exists());
    assert!(webapp.join("WEB-INF/lib/util-1.0.jar").exists());

    // The skin is gone and the library was upgraded.
    let upgraded = root.join("repo/util-2.0.jar");
    write_archive(&upgraded, &[("com/example/Util.class", "v2")]);
    let second = project(
        root,
        vec![Dependency::new("g", "util", "2.0", "jar").with_file(upgraded)],
        war,
    );
    assert!(matches!(
        WebappStructure::load(&second.cache_file(), &second.dependencies).unwrap(),
        CacheLoad::Stale(_)
    ));

    let result = WarBuilder::new(&second).explode().unwrap();
    assert!(!webapp.join("css/a.css").exists());
    assert!(!webapp.join("index.jsp").exists());
    assert!(!webapp.join("WEB-INF/lib/util-1.0.jar").exists());
    assert!(webapp.join("WEB-INF/lib/util-2.0.jar").exists());
    assert!(!result.structure.is_registered("css/a.css"));

    // The cache now matches the new dependency set.
    assert!(matches!(
        WebappStructure::load(&second.cache_file(), &second.dependencies).unwrap(),
        CacheLoad::Fresh(_)
    ));
}

#[test]
fn test_rebuild_is_idempotent() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();
    write(&root.join("src/main/webapp/WEB-INF/web.xml"), "<web-app/>");
    write(&root.join("src/main/webapp/about.html"), "${app.title}");
    write(&root.join("target/classes/com/example/Shop.class"), "class");

    let project = project(
        root,
        skins(root),
        WarConfig {
            overlays: vec![OverlayConfig {
                filtered: true,
                ..overlay("skin-b")
            }],
            ..WarConfig::default()
        },
    );

    let first = WarBuilder::new(&project).explode().unwrap();
    let before = snapshot(&first.webapp_directory);
    let second = WarBuilder::new(&project).explode().unwrap();
    let after = snapshot(&second.webapp_directory);

    assert!(!before.is_empty());
    assert_eq!(before, after);
    assert_eq!(second.unpacked, 0);
}

#[test]
fn test_filtering_only_where_configured() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();
    write(&root.join("filtered/title.txt"), "${app.title} @project.version@");
    write(&root.join("filtered/logo.png"), "${app.title}");
    write(&root.join("plain/raw.txt"), "${app.title}");
    write(&root.join("filters/extra.properties"), "app.owner=ACME\n");
    write(&root.join("filtered/owner.txt"), "${app.owner}");

    let project = project(
        root,
        Vec::new(),
        WarConfig {
            web_resources: vec![
                Resource {
                    directory: root.join("filtered"),
                    target_path: None,
                    filtering: true,
                    includes: Vec::new(),
                    excludes: Vec::new(),
                },
                Resource {
                    directory: root.join("plain"),
                    target_path: Some("static".to_string()),
                    filtering: false,
                    includes: Vec::new(),
                    excludes: Vec::new(),
                },
            ],
            filters: vec![root.join("filters/extra.properties")],
            ..WarConfig::default()
        },
    );
    let result = WarBuilder::new(&project).explode().unwrap();
    let read = |path: &str| std::fs::read_to_string(result.webapp_directory.join(path)).unwrap();

    assert_eq!(read("title.txt"), "Shop 1.0");
    assert_eq!(read("owner.txt"), "ACME");
    assert_eq!(read("logo.png"), "${app.title}");
    assert_eq!(read("static/raw.txt"), "${app.title}");
}

#[test]
fn test_package_requires_web_xml() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();
    write(&root.join("src/main/webapp/index.jsp"), "index");

    let strict = project(root, Vec::new(), WarConfig::default());
    assert!(matches!(
        WarBuilder::new(&strict).package(),
        Err(Error::MissingWebXml)
    ));

    let lenient = project(
        root,
        Vec::new(),
        WarConfig {
            fail_on_missing_web_xml: false,
            ..WarConfig::default()
        },
    );
    let result = WarBuilder::new(&lenient).package().unwrap();
    assert!(!result.archive.has_web_xml);
}

#[test]
fn test_package_archive_layout() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();
    write(&root.join("src/main/webapp/WEB-INF/web.xml"), "<web-app/>");
    write(&root.join("src/main/webapp/index.jsp"), "index");
    write(&root.join("src/main/webapp/notes.txt"), "notes");

    let project = project(
        root,
        skins(root),
        WarConfig {
            packaging_excludes: Some("*.txt".to_string()),
            ..WarConfig::default()
        },
    );
    let result = WarBuilder::new(&project).package().unwrap();

    let expected: Utf8PathBuf = root.join("target/shop-1.0.war");
    assert_eq!(result.archive.path, expected);
    assert!(result.archive.has_web_xml);

    let mut archive = ZipArchive::new(File::open(&expected).unwrap()).unwrap();
    assert_eq!(archive.by_index(0).unwrap().name(), "META-INF/MANIFEST.MF");
    let names = archive.file_names().map(str::to_string).collect::<Vec<_>>();
    assert!(names.contains(&"WEB-INF/web.xml".to_string()));
    assert!(names.contains(&"css/b.css".to_string()));
    assert!(!names.contains(&"notes.txt".to_string()));
}

/// Two `util-1.0.war` archives from different groups.
fn same_name_utils(root: &Utf8Path) -> Vec<Dependency> {
    let util_a = root.join("repo/org/a/util-1.0.war");
    let util_b = root.join("repo/org/b/util-1.0.war");
    write_archive(
        &util_a,
        &[("a-only.jsp", "a"), ("shared.jsp", "from a"), ("WEB-INF/classes/A.class", "a")],
    );
    write_archive(
        &util_b,
        &[("b-only.jsp", "b"), ("shared.jsp", "from b"), ("WEB-INF/classes/B.class", "b")],
    );
    vec![
        Dependency::new("org.a", "util", "1.0", "war").with_file(util_a),
        Dependency::new("org.b", "util", "1.0", "war").with_file(util_b),
    ]
}

#[test]
fn test_same_archive_names_keep_their_content() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();

    let project = project(root, same_name_utils(root), WarConfig::default());
    let result = WarBuilder::new(&project).explode().unwrap();
    let webapp = &result.webapp_directory;

    assert_eq!(result.overlays, vec![CURRENT_BUILD_ID, "org.a:util", "org.b:util"]);
    assert_eq!(result.unpacked, 2);
    assert_eq!(std::fs::read_to_string(webapp.join("a-only.jsp")).unwrap(), "a");
    assert_eq!(std::fs::read_to_string(webapp.join("b-only.jsp")).unwrap(), "b");
    assert_eq!(result.structure.get_owner("a-only.jsp"), Some("org.a:util"));
    assert_eq!(result.structure.get_owner("b-only.jsp"), Some("org.b:util"));
    assert_eq!(
        result.structure.get_owner("WEB-INF/classes/B.class"),
        Some("org.b:util")
    );
}

#[test]
fn test_parallel_unpack_keeps_priority_order() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();

    let mut dependencies = same_name_utils(root);
    dependencies.extend(skins(root));
    let util_b = OverlayConfig {
        group_id: Some("org.b".to_string()),
        artifact_id: Some("util".to_string()),
        ..OverlayConfig::default()
    };
    let project = project(
        root,
        dependencies,
        WarConfig {
            overlays: vec![overlay("skin-b"), util_b, overlay("skin-a")],
            ..WarConfig::default()
        },
    );

    let mut previous = None;
    for _ in 0..3 {
        let result = WarBuilder::new(&project).explode().unwrap();
        let webapp = &result.webapp_directory;

        assert_eq!(
            result.overlays,
            vec![CURRENT_BUILD_ID, "g:skin-b", "org.b:util", "g:skin-a", "org.a:util"]
        );
        assert_eq!(std::fs::read_to_string(webapp.join("index.jsp")).unwrap(), "skin b");
        assert_eq!(std::fs::read_to_string(webapp.join("shared.jsp")).unwrap(), "from b");
        assert_eq!(result.structure.get_owner("index.jsp"), Some("g:skin-b"));
        assert_eq!(result.structure.get_owner("shared.jsp"), Some("org.b:util"));
        assert_eq!(result.structure.get_owner("a-only.jsp"), Some("org.a:util"));
        assert_eq!(result.structure.get_owner("css/a.css"), Some("g:skin-a"));

        let files = snapshot(webapp);
        if let Some(previous) = &previous {
            assert_eq!(previous, &files);
        }
        previous = Some(files);
    }
}

#[test]
fn test_filtered_overlay_with_binary_files() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();

    let skin = root.join("repo/skin-1.0.war");
    std::fs::create_dir_all(skin.parent().unwrap()).unwrap();
    let mut zip = ZipWriter::new(File::create(&skin).unwrap());
    zip.start_file("index.jsp", SimpleFileOptions::default()).unwrap();
    zip.write_all(b"<h1>${app.title}</h1>").unwrap();
    zip.start_file("WEB-INF/classes/A.class", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(&[0xCA, 0xFE, 0xBA, 0xBE, 0xFF]).unwrap();
    zip.start_file("WEB-INF/data.bin", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(&[0xFF, 0xFE, b'$', b'{']).unwrap();
    zip.finish().unwrap();

    let project = project(
        root,
        vec![Dependency::new("g", "skin", "1.0", "war").with_file(skin)],
        WarConfig {
            overlays: vec![OverlayConfig {
                filtered: true,
                ..overlay("skin")
            }],
            ..WarConfig::default()
        },
    );
    let result = WarBuilder::new(&project).explode().unwrap();
    let webapp = &result.webapp_directory;

    assert_eq!(
        std::fs::read_to_string(webapp.join("index.jsp")).unwrap(),
        "<h1>Shop</h1>"
    );
    assert_eq!(
        std::fs::read(webapp.join("WEB-INF/classes/A.class")).unwrap(),
        vec![0xCA, 0xFE, 0xBA, 0xBE, 0xFF]
    );
    assert_eq!(
        std::fs::read(webapp.join("WEB-INF/data.bin")).unwrap(),
        vec![0xFF, 0xFE, b'$', b'{']
    );
}

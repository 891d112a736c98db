use std::collections::HashSet;
use std::fs;
use std::path::Path;

use chunkcdn_chunker::{chunk_dir, RouteOptions, RunOutput};
use chunkcdn_common::common_config::{StrategicConfig, CONFIG};
use chunkcdn_common::{read_manifest, reassemble, DirChunkSource, ResolvedChunk};

fn test_config() -> StrategicConfig {
    let mut config = CONFIG.clone();
    config.max_chunk_payload = 1000;
    config.max_workers = 3;
    config.compression_level = 9;
    config
}

fn pseudo_random(len: usize, seed: u32) -> Vec<u8> {
    let mut x = seed.wrapping_mul(2654435761).max(1);
    (0..len)
        .map(|_| {
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            (x >> 24) as u8
        })
        .collect()
}

fn populate(input: &Path) -> Vec<(&'static str, Vec<u8>)> {
    let files = vec![
        ("text.txt", b"all work and no play ".repeat(150)),
        ("noise.bin", pseudo_random(2500, 7)),
        ("exact.bin", pseudo_random(2000, 11)),
        ("empty.dat", Vec::new()),
        ("video.mp4", vec![0u8; 1500]),
    ];
    for (name, data) in &files {
        fs::write(input.join(name), data).unwrap();
    }
    fs::write(input.join(".hidden"), b"secret").unwrap();
    files
}

fn rebuild(chunk_dir: &Path, manifest: &chunkcdn_common::Manifest, key: &str) -> Vec<u8> {
    let resolved: Vec<ResolvedChunk> = manifest
        .get(key)
        .unwrap()
        .iter()
        .map(|c| ResolvedChunk::new(format!("http://cdn.test/chunk/{}", c.name), c))
        .collect();
    let mut out = Vec::new();
    reassemble(&resolved, &DirChunkSource::new(chunk_dir), &mut out).unwrap();
    out
}

#[test]
fn test_chunk_dir_roundtrip() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let files = populate(input.path());
    let config = test_config();

    let report = chunk_dir(input.path(), output.path(), &config, &RouteOptions::default()).unwrap();
    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert_eq!(report.total_files, 5);
    assert_eq!(report.chunked_files, 5);
    assert_eq!(report.skipped_entries, 1);

    let out = RunOutput::new(output.path(), &config);
    let manifest = read_manifest(&out.manifest_path).unwrap();
    assert_eq!(manifest.len(), 5);
    assert!(!manifest.contains_key(".hidden"));

    for (key, data) in &files {
        let chunks = manifest.get(key).unwrap();
        assert_eq!(chunks.len() as u64, (data.len() as u64).div_ceil(1000), "{key}");
        assert_eq!(rebuild(&out.chunk_dir, &manifest, key), *data, "{key}");
    }

    assert_eq!(manifest.get("exact.bin").unwrap().len(), 2);
    assert!(manifest.get("empty.dat").unwrap().is_empty());
    assert_eq!(report.chunks as usize, manifest.chunk_count());
}

#[test]
fn test_chunk_names_unique_and_match_store() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    populate(input.path());
    let config = test_config();

    chunk_dir(input.path(), output.path(), &config, &RouteOptions::default()).unwrap();
    let out = RunOutput::new(output.path(), &config);
    let manifest = read_manifest(&out.manifest_path).unwrap();

    let mut names = HashSet::new();
    for (_, chunks) in manifest.iter() {
        for chunk in chunks {
            assert!(names.insert(chunk.name.clone()), "duplicate {}", chunk.name);
            let stored = fs::metadata(out.chunk_dir.join(&chunk.name)).unwrap().len();
            assert_eq!(stored, chunk.compressed_length);
        }
    }
    assert_eq!(fs::read_dir(&out.chunk_dir).unwrap().count(), names.len());
}

#[test]
fn test_rerun_replaces_chunk_directory() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    populate(input.path());
    let config = test_config();

    chunk_dir(input.path(), output.path(), &config, &RouteOptions::default()).unwrap();
    fs::remove_file(input.path().join("noise.bin")).unwrap();
    chunk_dir(input.path(), output.path(), &config, &RouteOptions::default()).unwrap();

    let out = RunOutput::new(output.path(), &config);
    let manifest = read_manifest(&out.manifest_path).unwrap();
    assert!(!manifest.contains_key("noise.bin"));
    assert_eq!(fs::read_dir(&out.chunk_dir).unwrap().count(), manifest.chunk_count());
}

#[test]
fn test_compressed_manifest_and_routes() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    populate(input.path());
    let mut config = test_config();
    config.compress_manifest = true;

    chunk_dir(input.path(), output.path(), &config, &RouteOptions::default()).unwrap();
    let out = RunOutput::new(output.path(), &config);
    assert!(out.manifest_path.ends_with("chunks.json.zst"));
    assert_eq!(read_manifest(&out.manifest_path).unwrap().len(), 5);

    let routes = fs::read_to_string(&out.routes_path).unwrap();
    assert!(routes.contains("url: /video.mp4"), "{routes}");
    assert!(routes.contains("static_dir: chunk"), "{routes}");
}

#[test]
fn test_output_inside_input_is_not_chunked() {
    let input = tempfile::tempdir().unwrap();
    populate(input.path());
    let output = input.path().join("site");
    let config = test_config();

    let report = chunk_dir(input.path(), &output, &config, &RouteOptions::default()).unwrap();
    assert_eq!(report.total_files, 5);

    let manifest = read_manifest(&RunOutput::new(&output, &config).manifest_path).unwrap();
    assert!(manifest.keys().all(|k| !k.starts_with("site/")));
}

#[test]
fn test_same_input_and_output_rejected() {
    let input = tempfile::tempdir().unwrap();
    let err = chunk_dir(input.path(), input.path(), &test_config(), &RouteOptions::default()).unwrap_err();
    assert!(err.to_string().contains("cannot be the same"), "{err}");
}

#[test]
fn test_input_inside_chunk_directory_rejected() {
    let output = tempfile::tempdir().unwrap();
    let config = test_config();
    let input = output.path().join(&config.chunk_namespace);
    fs::create_dir_all(input.join("nested")).unwrap();
    fs::write(input.join("precious.bin"), b"keep me").unwrap();
    fs::write(input.join("nested").join("also.bin"), b"and me").unwrap();

    for source in [input.clone(), input.join("nested")] {
        let err = chunk_dir(&source, output.path(), &config, &RouteOptions::default()).unwrap_err();
        assert!(err.to_string().contains("inside the chunk directory"), "{err}");
    }

    assert_eq!(fs::read(input.join("precious.bin")).unwrap(), b"keep me");
    assert_eq!(fs::read(input.join("nested").join("also.bin")).unwrap(), b"and me");
}

use agsearch::{default_config, Engine, EngineConfig, ResultFlags, SearchError, SearchOutput};
use anyhow::Result;
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;

// Only one engine may exist per process
static ENGINE_LOCK: Mutex<()> = Mutex::new(());

fn search_with(config: EngineConfig, pattern: &str, paths: &[&Path]) -> Result<SearchOutput> {
    let engine = Engine::init(config)?;
    let output = engine.search(pattern, paths)?;
    engine.finish();
    Ok(output)
}

fn create_test_files(dir: &Path, file_count: usize, lines_per_file: usize) -> Result<()> {
    for i in 0..file_count {
        let mut file = File::create(dir.join(format!("test_{}.txt", i)))?;
        for j in 0..lines_per_file {
            writeln!(file, "Line {} in file {}: TODO implement this", j, i)?;
            writeln!(file, "Another line {} in file {}: nothing special", j, i)?;
        }
    }
    Ok(())
}

#[test]
fn test_literal_spans() -> Result<()> {
    let _guard = ENGINE_LOCK.lock();
    let dir = tempdir()?;
    let file = dir.path().join("a.txt");
    fs::write(&file, "xfooybarzfoo")?;

    let output = search_with(default_config(), "foo", &[dir.path()])?;
    assert_eq!(output.nresults, 2);
    assert_eq!(output.results.len(), 1);

    let result = &output.results[0];
    assert_eq!(result.file.path, file.canonicalize()?);
    assert_eq!(result.flags, ResultFlags::TEXT);
    let spans: Vec<_> = result
        .matches
        .iter()
        .map(|m| (m.byte_start, m.byte_end, m.text_lossy().into_owned()))
        .collect();
    assert_eq!(
        spans,
        vec![(1, 4, "foo".to_string()), (9, 12, "foo".to_string())]
    );
    Ok(())
}

#[test]
fn test_many_files_with_four_workers() -> Result<()> {
    let _guard = ENGINE_LOCK.lock();
    let dir = tempdir()?;
    create_test_files(dir.path(), 100, 10)?;

    let mut config = default_config();
    config.num_workers = 4;
    let output = search_with(config, "TODO", &[dir.path()])?;

    assert_eq!(output.results.len(), 100);
    assert_eq!(output.nresults, 1000);
    let sum: usize = output.results.iter().map(|r| r.matches.len()).sum();
    assert_eq!(output.nresults, sum);
    assert_eq!(output.stats.total_files, 100);
    assert!(output.warnings.is_empty());
    Ok(())
}

#[test]
fn test_spans_stay_inside_files() -> Result<()> {
    let _guard = ENGINE_LOCK.lock();
    let dir = tempdir()?;
    create_test_files(dir.path(), 5, 50)?;

    let output = search_with(default_config(), r"file \d+", &[dir.path()])?;
    assert!(output.nresults > 0);
    for result in &output.results {
        let content = fs::read(&result.file.path)?;
        assert_eq!(result.file.size, content.len() as u64);
        let mut previous_end = 0;
        for m in &result.matches {
            assert!(m.byte_start <= m.byte_end);
            assert!(m.byte_end <= result.file.size);
            assert!(m.byte_start >= previous_end);
            assert_eq!(
                &content[m.byte_start as usize..m.byte_end as usize],
                m.matched_text.as_slice()
            );
            previous_end = m.byte_end;
        }
    }
    Ok(())
}

#[test]
fn test_deterministic_mode_is_repeatable() -> Result<()> {
    let _guard = ENGINE_LOCK.lock();
    let dir = tempdir()?;
    create_test_files(dir.path(), 40, 5)?;
    fs::create_dir(dir.path().join("nested"))?;
    create_test_files(&dir.path().join("nested"), 20, 5)?;

    let mut config = default_config();
    config.num_workers = 6;
    config.deterministic = true;
    let engine = Engine::init(config)?;
    let first = engine.search("TODO", &[dir.path()])?;
    let second = engine.search("TODO", &[dir.path()])?;
    engine.finish();

    assert_eq!(first.nresults, 300);
    assert_eq!(first.results, second.results);
    let paths: Vec<_> = first.files().collect();
    let mut sorted = paths.clone();
    sorted.sort_by_key(|p| p.as_os_str().as_encoded_bytes());
    assert_eq!(paths, sorted);
    Ok(())
}

#[test]
fn test_deterministic_order_compares_raw_path_bytes() -> Result<()> {
    let _guard = ENGINE_LOCK.lock();
    let dir = tempdir()?;
    fs::create_dir(dir.path().join("a"))?;
    fs::write(dir.path().join("a/b.txt"), "needle")?;
    fs::write(dir.path().join("a-c.txt"), "needle")?;

    let mut config = default_config();
    config.deterministic = true;
    let output = search_with(config, "needle", &[dir.path()])?;

    let root = dir.path().canonicalize()?;
    let paths: Vec<_> = output.files().cloned().collect();
    assert_eq!(paths, vec![root.join("a-c.txt"), root.join("a/b.txt")]);
    Ok(())
}

#[test]
fn test_binary_files_excluded_by_default() -> Result<()> {
    let _guard = ENGINE_LOCK.lock();
    let dir = tempdir()?;
    fs::write(dir.path().join("text.txt"), "needle in text")?;
    fs::write(dir.path().join("blob.bin"), b"\x00\x01\x02needle\x00")?;

    let output = search_with(default_config(), "needle", &[dir.path()])?;
    assert_eq!(output.results.len(), 1);
    assert!(output.results.iter().all(|r| r.flags.bits() & 2 == 0));
    assert_eq!(output.stats.binary_files_skipped, 1);

    let mut config = default_config();
    config.search_binary_files = true;
    let output = search_with(config, "needle", &[dir.path()])?;
    assert_eq!(output.results.len(), 2);
    let binary: Vec<_> = output.results.iter().filter(|r| r.is_binary()).collect();
    assert_eq!(binary.len(), 1);
    assert_eq!(binary[0].flags.bits() & 2, 2);
    Ok(())
}

#[test]
fn test_empty_path_list() -> Result<()> {
    let _guard = ENGINE_LOCK.lock();
    let output = search_with(default_config(), "anything", &[])?;
    assert_eq!(output.nresults, 0);
    assert!(output.results.is_empty());
    assert_eq!(output.to_json()?, r#"{"nresults":0,"results":[]}"#);
    Ok(())
}

#[test]
fn test_invalid_pattern_is_fatal() -> Result<()> {
    let _guard = ENGINE_LOCK.lock();
    let dir = tempdir()?;
    fs::write(dir.path().join("a.txt"), "text")?;

    let engine = Engine::init(default_config())?;
    let err = engine.search("foo(", &[dir.path()]).unwrap_err();
    assert!(err.is_pattern_error());
    assert!(matches!(err, SearchError::InvalidPattern { .. }));

    // The engine stays usable
    let output = engine.search("text", &[dir.path()])?;
    assert_eq!(output.nresults, 1);
    engine.finish();
    Ok(())
}

#[test]
fn test_double_init() -> Result<()> {
    let _guard = ENGINE_LOCK.lock();
    let engine = Engine::init(default_config())?;
    let second = Engine::init(default_config());
    assert!(matches!(second, Err(SearchError::AlreadyInitialized)));
    engine.finish();
    Engine::init(default_config())?.finish();
    Ok(())
}

#[test]
fn test_timeout_sets_flag() -> Result<()> {
    let _guard = ENGINE_LOCK.lock();
    let dir = tempdir()?;
    create_test_files(dir.path(), 50, 5)?;

    let mut config = default_config();
    config.timeout = Some(Duration::ZERO);
    let output = search_with(config, "TODO", &[dir.path()])?;
    assert!(output.timed_out());
    assert!(output.flags.contains(ResultFlags::TIMED_OUT));
    assert!(output.results.len() < 50);
    Ok(())
}

#[test]
fn test_ignore_rules_from_config() -> Result<()> {
    let _guard = ENGINE_LOCK.lock();
    let dir = tempdir()?;
    fs::create_dir_all(dir.path().join("target/debug"))?;
    fs::write(dir.path().join("main.rs"), "fn needle() {}")?;
    fs::write(dir.path().join("notes.log"), "needle")?;
    fs::write(dir.path().join("keep.log"), "needle")?;
    fs::write(dir.path().join("target/debug/out.rs"), "needle")?;

    let mut config = default_config();
    config.deterministic = true;
    config.ignore_patterns = vec![
        "target/".to_string(),
        "*.log".to_string(),
        "!keep.log".to_string(),
    ];
    let output = search_with(config, "needle", &[dir.path()])?;
    let names: Vec<_> = output
        .files()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["keep.log", "main.rs"]);
    Ok(())
}

#[test]
fn test_case_modes() -> Result<()> {
    let _guard = ENGINE_LOCK.lock();
    let dir = tempdir()?;
    fs::write(dir.path().join("a.txt"), "Foo foo FOO")?;

    let output = search_with(default_config(), "foo", &[dir.path()])?;
    assert_eq!(output.nresults, 1);

    let mut config = default_config();
    config.case_sensitive = false;
    assert_eq!(search_with(config, "foo", &[dir.path()])?.nresults, 3);

    let mut config = default_config();
    config.smart_case = true;
    let engine = Engine::init(config)?;
    assert_eq!(engine.search("foo", &[dir.path()])?.nresults, 3);
    assert_eq!(engine.search("Foo", &[dir.path()])?.nresults, 1);
    engine.finish();
    Ok(())
}

#[test]
fn test_missing_path_is_a_warning() -> Result<()> {
    let _guard = ENGINE_LOCK.lock();
    let dir = tempdir()?;
    fs::write(dir.path().join("a.txt"), "foo")?;
    let missing = dir.path().join("missing");

    let output = search_with(default_config(), "foo", &[missing.as_path(), dir.path()])?;
    assert_eq!(output.nresults, 1);
    assert_eq!(output.warnings.len(), 1);
    assert_eq!(output.warnings[0].path.as_deref(), Some(missing.as_path()));
    assert_eq!(output.stats.warnings, 1);
    Ok(())
}

#[test]
fn test_json_wire_shape() -> Result<()> {
    let _guard = ENGINE_LOCK.lock();
    let dir = tempdir()?;
    let file = dir.path().join("a.txt");
    fs::write(&file, "xfooybarzfoo")?;

    let output = search_with(default_config(), "foo", &[file.as_path()])?;
    let json: serde_json::Value = serde_json::from_str(&output.to_json()?)?;
    assert_eq!(json["nresults"], 2);
    let result = &json["results"][0];
    assert_eq!(result["flags"], 1);
    assert_eq!(result["matches"][1]["match"], "foo");
    assert_eq!(result["matches"][1]["byte_start"], 9);
    assert_eq!(result["matches"][1]["byte_end"], 12);
    Ok(())
}

#[test]
fn test_large_file_matches_across_chunks() -> Result<()> {
    let _guard = ENGINE_LOCK.lock();
    let dir = tempdir()?;
    let path = dir.path().join("big.txt");
    let mut file = File::create(&path)?;
    // Just over the chunked-read threshold
    let line = "padding padding padding needle_42 padding\n";
    let lines = (10 * 1024 * 1024) / line.len() + 10;
    for _ in 0..lines {
        file.write_all(line.as_bytes())?;
    }
    drop(file);

    let output = search_with(default_config(), r"needle_\d+", &[path.as_path()])?;
    assert_eq!(output.nresults, lines);
    let result = &output.results[0];
    for (i, m) in result.matches.iter().enumerate() {
        assert_eq!(m.byte_start, (i * line.len() + 24) as u64);
        assert_eq!(m.len(), 9);
    }
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_unreadable_directory_is_a_warning() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let _guard = ENGINE_LOCK.lock();
    let dir = tempdir()?;
    fs::write(dir.path().join("open.txt"), "needle")?;
    let locked = dir.path().join("locked");
    fs::create_dir(&locked)?;
    fs::write(locked.join("hidden_away.txt"), "needle")?;
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000))?;
    if fs::read_dir(&locked).is_ok() {
        // Permission bits are not enforced for this user
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755))?;
        return Ok(());
    }

    let result = search_with(default_config(), "needle", &[dir.path()]);
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755))?;
    let output = result?;

    assert_eq!(output.nresults, 1);
    assert_eq!(output.warnings.len(), 1);
    assert_eq!(output.warnings[0].path, Some(locked.canonicalize()?));
    assert_eq!(output.stats.warnings, 1);
    Ok(())
}

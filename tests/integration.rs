//! Integration tests for Keyboard Debounce
//!
//! These tests drive the full pipeline: arguments and config resolved into a
//! policy, events fed through a session by an input source, and the report.

use keyboard_debounce::cli::{parse_args, Action, CliError};
use keyboard_debounce::config::{Config, ConfigError};
use keyboard_debounce::keyboard::{
    lookup_key, InterceptError, KeyCode, KeyEvent, KeyInterceptor,
};
use keyboard_debounce::report::SessionReport;
use keyboard_debounce::{PolicyBuilder, Session, Verdict};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn key(name: &str) -> KeyCode {
    lookup_key(name).unwrap_or_else(|| panic!("no key named {}", name))
}

/// Input source that replays a fixed list of events and records what it
/// would have delivered
struct ScriptedSource {
    script: Vec<KeyEvent>,
    delivered: Vec<KeyEvent>,
    verdicts: Vec<Verdict>,
}

impl ScriptedSource {
    fn new(script: Vec<KeyEvent>) -> Self {
        Self {
            script,
            delivered: Vec::new(),
            verdicts: Vec::new(),
        }
    }
}

impl KeyInterceptor for ScriptedSource {
    fn run(
        &mut self,
        running: &AtomicBool,
        handler: &mut dyn FnMut(&KeyEvent) -> Verdict,
    ) -> Result<(), InterceptError> {
        for event in &self.script {
            if !running.load(Ordering::SeqCst) {
                break;
            }
            let verdict = handler(event);
            self.verdicts.push(verdict);
            if verdict == Verdict::Pass {
                self.delivered.push(*event);
            }
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{} scripted events", self.script.len())
    }
}

fn run_script(session: &mut Session, script: Vec<KeyEvent>) -> ScriptedSource {
    let mut source = ScriptedSource::new(script);
    let running = AtomicBool::new(true);
    source
        .run(&running, &mut |event| session.process_event(event))
        .expect("scripted source never fails");
    source
}

fn run_action(args: &[&str]) -> Action {
    let mut full = vec!["keyboard-debounce", "--no-config"];
    full.extend_from_slice(args);
    parse_args(full)
        .expect("arguments should parse")
        .into_action()
        .expect("arguments should resolve")
}

// ---------------------------------------------------------------------------
// Filtering scenarios
// ---------------------------------------------------------------------------

#[test]
fn all_keys_release_press_release_press() {
    let n = key("n");
    let policy = PolicyBuilder::new()
        .apply_to_all(true)
        .set_default(ms(40))
        .build();
    let mut session = Session::new(policy);
    let t0 = Instant::now();

    let source = run_script(
        &mut session,
        vec![
            KeyEvent::release(n, t0),
            KeyEvent::press(n, t0 + ms(25)),
            KeyEvent::release(n, t0 + ms(30)),
            KeyEvent::press(n, t0 + ms(75)),
        ],
    );

    assert_eq!(
        source.verdicts,
        vec![Verdict::Pass, Verdict::Drop, Verdict::Pass, Verdict::Pass]
    );
    assert_eq!(source.delivered.len(), 3);
}

#[test]
fn unlisted_key_passes_rapid_sequence() {
    let q = key("q");
    let policy = PolicyBuilder::new()
        .set_default(ms(40))
        .add_key(key("x"), Some(ms(50)))
        .build();
    let mut session = Session::new(policy);
    let t0 = Instant::now();

    let source = run_script(
        &mut session,
        vec![
            KeyEvent::press(q, t0),
            KeyEvent::release(q, t0 + ms(1)),
            KeyEvent::press(q, t0 + ms(2)),
        ],
    );

    assert!(source.verdicts.iter().all(|v| *v == Verdict::Pass));
    assert_eq!(session.filter().tracked_keys(), 0);
    assert_eq!(session.total_dropped(), 0);
}

#[test]
fn bounce_burst_is_measured_from_one_release() {
    let b = key("b");
    let policy = PolicyBuilder::new().add_key(b, None).build();
    let mut session = Session::new(policy);
    let t0 = Instant::now();

    let source = run_script(
        &mut session,
        vec![
            KeyEvent::press(b, t0),
            KeyEvent::release(b, t0 + ms(90)),
            KeyEvent::press(b, t0 + ms(91)),
            KeyEvent::press(b, t0 + ms(92)),
            KeyEvent::press(b, t0 + ms(129)),
            KeyEvent::press(b, t0 + ms(130)),
        ],
    );

    assert_eq!(
        source.verdicts,
        vec![
            Verdict::Pass,
            Verdict::Pass,
            Verdict::Drop,
            Verdict::Drop,
            Verdict::Drop,
            Verdict::Pass,
        ]
    );
    let stats = session.key_stats(b).unwrap();
    assert_eq!(stats.dropped, 3);
    assert_eq!(stats.min_drop_gap, Some(ms(1)));
    assert_eq!(stats.max_drop_gap, Some(ms(39)));
}

#[test]
fn fast_legitimate_typing_is_not_penalized() {
    let policy = PolicyBuilder::new().apply_to_all(true).build();
    let mut session = Session::new(policy);
    let t0 = Instant::now();

    // Different keys in quick succession never interfere with each other.
    let mut script = Vec::new();
    for (i, name) in ["h", "e", "l", "o"].iter().enumerate() {
        let at = t0 + ms(i as u64 * 10);
        script.push(KeyEvent::press(key(name), at));
        script.push(KeyEvent::release(key(name), at + ms(5)));
    }
    // Repeating a letter after a normal gap is fine too.
    script.push(KeyEvent::press(key("l"), t0 + ms(200)));

    let source = run_script(&mut session, script);
    assert!(source.verdicts.iter().all(|v| *v == Verdict::Pass));
}

#[test]
fn stopped_source_delivers_nothing() {
    let mut session = Session::new(PolicyBuilder::new().apply_to_all(true).build());
    let mut source = ScriptedSource::new(vec![KeyEvent::press(key("a"), Instant::now())]);
    let running = AtomicBool::new(false);
    source
        .run(&running, &mut |event| session.process_event(event))
        .unwrap();
    assert!(source.delivered.is_empty());
    assert_eq!(session.total_events(), 0);
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[test]
fn override_resolution_through_cli() {
    let action = run_action(&["-d", "40", "-k", "j"]);
    let Action::Run(settings) = action else {
        panic!("expected a run action");
    };
    assert_eq!(settings.policy.threshold_for(key("j")), ms(40));

    let action = run_action(&["-d", "40", "-k", "j:60"]);
    let Action::Run(settings) = action else {
        panic!("expected a run action");
    };
    assert_eq!(settings.policy.threshold_for(key("j")), ms(60));
}

#[test]
fn cli_policy_drives_session() {
    let Action::Run(settings) = run_action(&["-k", "RETURN:30", "-q"]) else {
        panic!("expected a run action");
    };
    assert!(!settings.print_drops);

    let enter = key("Enter");
    let mut session = Session::new(settings.policy);
    let t0 = Instant::now();
    let source = run_script(
        &mut session,
        vec![
            KeyEvent::release(enter, t0),
            KeyEvent::press(enter, t0 + ms(29)),
            KeyEvent::press(enter, t0 + ms(30)),
        ],
    );
    assert_eq!(
        source.verdicts,
        vec![Verdict::Pass, Verdict::Drop, Verdict::Pass]
    );
}

#[test]
fn config_file_and_flags_combine() {
    let path = std::env::temp_dir().join(format!(
        "keyboard-debounce-integration-{}.toml",
        std::process::id()
    ));
    std::fs::write(
        &path,
        "[debounce]\ndefault_ms = 20\nkeys = [\"b\", \"n:70\"]\n\n[output]\nlog_drops = false\n",
    )
    .unwrap();

    let path_str = path.to_string_lossy().to_string();
    let action = parse_args(["keyboard-debounce", "-c", &path_str, "-k", "m"])
        .unwrap()
        .into_action()
        .unwrap();
    let _ = std::fs::remove_file(&path);

    let Action::Run(settings) = action else {
        panic!("expected a run action");
    };
    assert!(!settings.print_drops);
    assert_eq!(settings.policy.threshold_for(key("b")), ms(20));
    assert_eq!(settings.policy.threshold_for(key("n")), ms(70));
    assert_eq!(settings.policy.threshold_for(key("m")), ms(20));
    assert!(!settings.policy.is_filtered(key("q")));
}

#[test]
fn missing_explicit_config_is_an_error() {
    let result = parse_args(["keyboard-debounce", "-c", "/nonexistent/kd.toml", "-a"])
        .unwrap()
        .into_action();
    assert!(result.is_err());
}

#[test]
fn write_config_round_trips_policy() {
    let Action::WriteConfig { path, config } =
        run_action(&["-a", "-k", "n", "-d", "55", "--write-config", "kd.toml"])
    else {
        panic!("expected a write-config action");
    };
    assert_eq!(path.to_string_lossy(), "kd.toml");

    let toml_str = toml::to_string_pretty(&config).unwrap();
    let reloaded: Config = toml::from_str(&toml_str).unwrap();
    let policy = reloaded.policy_builder().unwrap().build();
    assert!(policy.applies_to_all());
    assert_eq!(policy.default_duration(), ms(55));
    assert_eq!(policy.threshold_for(key("n")), ms(40));
}

#[test]
fn each_duration_flag_covers_the_keys_after_it() {
    let Action::Run(settings) = run_action(&["-d", "30", "-k", "a", "-d", "60", "-k", "b"]) else {
        panic!("expected a run action");
    };
    assert_eq!(settings.policy.threshold_for(key("a")), ms(30));
    assert_eq!(settings.policy.threshold_for(key("b")), ms(60));
}

#[test]
fn write_config_refuses_unrepresentable_zero_window() {
    let result = parse_args([
        "keyboard-debounce",
        "--no-config",
        "-d",
        "0",
        "-k",
        "j",
        "-d",
        "50",
        "--write-config",
        "kd.toml",
    ])
    .unwrap()
    .into_action();
    assert!(matches!(
        result,
        Err(CliError::Config(ConfigError::ZeroOverride { default_ms: 50, .. }))
    ));
}

// ---------------------------------------------------------------------------
// Report generation & export
// ---------------------------------------------------------------------------

#[test]
fn report_file_export_json() {
    let n = key("n");
    let mut session = Session::new(PolicyBuilder::new().add_key(n, Some(ms(40))).build());
    let t0 = Instant::now();
    run_script(
        &mut session,
        vec![KeyEvent::release(n, t0), KeyEvent::press(n, t0 + ms(8))],
    );

    let path = std::env::temp_dir().join(format!(
        "keyboard-debounce-report-{}.json",
        std::process::id()
    ));
    SessionReport::new(&session)
        .export_json(&path)
        .expect("export should succeed");

    let contents = std::fs::read_to_string(&path).unwrap();
    let _ = std::fs::remove_file(&path);
    let value: serde_json::Value = serde_json::from_str(&contents).unwrap();

    assert_eq!(value["summary"]["total_events"], 2);
    assert_eq!(value["summary"]["presses_dropped"], 1);
    assert_eq!(value["keys"][0]["key"], "N");
    assert_eq!(value["keys"][0]["dropped"], 1);
    assert_eq!(value["policy"]["keys"][0]["duration_ms"], 40);
}

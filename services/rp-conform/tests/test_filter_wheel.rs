use std::sync::Arc;
use std::time::Duration;

use rp_conform::filter_wheel::FilterWheelTester;
use rp_conform::simulator::SimulatedFilterWheel;
use rp_conform::tester::run_tester;
use rp_conform::{Config, DeviceType, Outcome, Report};
use tokio_util::sync::CancellationToken;

fn fast_config() -> Config {
    let mut config = Config::default();
    config.device.device_type = DeviceType::FilterWheel;
    config.device.simulate = true;
    config.general.poll_interval = Duration::from_millis(10);
    config.general.perf_loop_time = Duration::from_millis(100);
    config.simulator.filter_move_duration = Duration::from_millis(20);
    config
}

async fn run(config: &Config) -> Report {
    rp_conform::run(config, CancellationToken::new())
        .await
        .unwrap()
}

fn oks_starting_with<'a>(report: &'a Report, prefix: &'a str) -> usize {
    report
        .entries
        .iter()
        .filter(|e| e.outcome == Outcome::Ok && e.message.starts_with(prefix))
        .count()
}

#[tokio::test]
async fn simulated_wheel_is_conformant() {
    let config = fast_config();
    let report = run(&config).await;

    let issues: Vec<_> = report.issues().collect();
    assert!(issues.is_empty(), "unexpected issues: {:?}", issues);
    assert!(!report.cancelled);
    assert_eq!(oks_starting_with(&report, "Reached position"), 10);
    assert_eq!(
        oks_starting_with(&report, "Correctly rejected bad position"),
        2
    );
}

#[tokio::test]
async fn rejects_both_out_of_range_positions() {
    let config = fast_config();
    let report = run(&config).await;

    let rejected: Vec<_> = report
        .for_test("Position Set")
        .filter(|e| e.message.starts_with("Correctly rejected"))
        .map(|e| e.message.clone())
        .collect();
    assert_eq!(
        rejected,
        vec![
            "Correctly rejected bad position: -1".to_string(),
            "Correctly rejected bad position: 5".to_string(),
        ]
    );
}

#[tokio::test]
async fn mismatched_names_and_offsets_is_an_issue() {
    let mut config = fast_config();
    config.simulator.filter_offsets = vec![0, 10, 20];
    let device = Arc::new(SimulatedFilterWheel::new(&config.simulator));
    let tester = FilterWheelTester::new(device, &config, CancellationToken::new());

    let report = run_tester(Box::new(tester), false).await;

    assert!(report
        .issues()
        .any(|e| e.test == "Names" && e.message.contains("are different")));
}

#[tokio::test]
async fn performance_is_measured_when_enabled() {
    let mut config = fast_config();
    config.general.performance_tests = true;
    let report = run(&config).await;

    for member in ["FocusOffsets", "Names", "Position"] {
        assert!(
            report
                .for_test(member)
                .any(|e| e.outcome == Outcome::Info && e.message.starts_with("Transaction rate")),
            "no performance entry for {}",
            member
        );
    }
}

#[tokio::test]
async fn cancelled_run_is_flagged() {
    let config = fast_config();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = rp_conform::run(&config, cancel).await.unwrap();

    assert!(report.cancelled);
    assert_eq!(report.for_test("Position Set").count(), 0);
}

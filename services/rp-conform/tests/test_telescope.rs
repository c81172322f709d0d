use std::sync::Arc;
use std::time::Duration;

use rp_conform::simulator::{MountOptions, SimulatedTelescope};
use rp_conform::telescope::{SlewSyncType, TelescopeTester};
use rp_conform::tester::run_tester;
use rp_conform::{Config, DeviceType, Outcome, Report};
use tokio_util::sync::CancellationToken;

fn fast_config() -> Config {
    let mut config = Config::default();
    config.device.device_type = DeviceType::Telescope;
    config.device.simulate = true;
    config.general.poll_interval = Duration::from_millis(10);
    config.general.perf_loop_time = Duration::from_millis(100);
    config.telescope.slew_minimum_wait = Duration::ZERO;
    config.telescope.maximum_slew_time = Duration::from_secs(10);
    config.telescope.move_axis_duration = Duration::from_millis(50);
    config.telescope.pulse_guide_duration = Duration::from_millis(100);
    config.telescope.pulse_guide_timeout = Duration::from_secs(2);
    config.telescope.rate_offset_duration = Duration::from_millis(300);
    config.telescope.extended_pulse_guide_duration = Duration::from_millis(200);
    config.simulator.slew_duration = Duration::from_millis(20);
    config
}

async fn run_with_options(config: &Config, options: MountOptions) -> Report {
    let device = Arc::new(SimulatedTelescope::with_options(&config.simulator, options));
    let tester = TelescopeTester::new(device, config, CancellationToken::new());
    run_tester(Box::new(tester), config.general.performance_tests).await
}

async fn run(config: &Config) -> Report {
    rp_conform::run(config, CancellationToken::new())
        .await
        .unwrap()
}

fn assert_no_issues(report: &Report) {
    let issues: Vec<_> = report.issues().collect();
    assert!(issues.is_empty(), "unexpected issues: {:#?}", issues);
}

#[tokio::test]
async fn simulated_mount_is_conformant() {
    let config = fast_config();
    let report = run(&config).await;

    assert_no_issues(&report);
    assert!(!report.cancelled);
    assert_eq!(report.device, "Simulated Telescope");
}

#[tokio::test]
async fn every_slew_and_sync_reaches_its_position() {
    let config = fast_config();
    let report = run(&config).await;

    for kind in SlewSyncType::ALL {
        assert!(
            report
                .for_test(kind.name())
                .any(|e| e.outcome == Outcome::Ok && e.message.contains("to within")),
            "{} did not reach its position",
            kind
        );
    }
    assert!(report
        .for_test("SlewToCoordinates Bad Coordinates")
        .any(|e| e.message == "Correctly rejected Declination 100"));
}

#[tokio::test]
async fn pointing_state_is_recognised() {
    let config = fast_config();
    let report = run(&config).await;

    assert!(report
        .for_test("SideOfPier Model")
        .any(|e| e.outcome == Outcome::Ok && e.message.contains("pointing state")));
    assert_eq!(
        report
            .for_test("SideOfPier Write")
            .filter(|e| e.outcome == Outcome::Ok)
            .count(),
        2
    );
}

#[tokio::test]
async fn physical_pier_side_is_an_issue() {
    let mut config = fast_config();
    config.simulator.physical_pier_side = true;
    let report = run(&config).await;

    assert!(report
        .issues()
        .any(|e| e.test == "SideOfPier Model" && e.message.contains("physical pier side")));
}

#[tokio::test]
async fn parked_mount_rejects_motion() {
    let config = fast_config();
    let report = run(&config).await;

    for member in [
        "SlewToCoordinates",
        "SyncToAltAz",
        "MoveAxis",
        "PulseGuide",
        "FindHome",
        "AbortSlew",
    ] {
        let test = format!("{} While Parked", member);
        assert!(
            report.for_test(&test).any(|e| e.outcome == Outcome::Ok),
            "{} was not rejected while parked",
            member
        );
    }
    assert!(report
        .for_test("SetPark")
        .any(|e| e.outcome == Outcome::Info));
}

#[tokio::test]
async fn missing_capabilities_are_reported_as_not_implemented() {
    let config = fast_config();
    let options = MountOptions {
        can_find_home: false,
        can_pulse_guide: false,
        can_set_declination_rate: false,
        can_set_guide_rates: false,
        can_set_park: false,
        can_set_pier_side: false,
        can_slew_alt_az: false,
        can_slew_alt_az_async: false,
        can_sync_alt_az: false,
        can_move_primary: false,
        can_move_secondary: false,
        ..Default::default()
    };
    let report = run_with_options(&config, options).await;

    assert_no_issues(&report);
    for test in [
        "FindHome",
        "PulseGuide",
        "SetPark",
        "SlewToAltAz",
        "SyncToAltAz",
        "SideOfPier Write",
    ] {
        assert!(
            report.for_test(test).any(|e| e.outcome == Outcome::Ok),
            "no OK entry for {}",
            test
        );
    }
}

#[tokio::test]
async fn mount_that_cannot_unpark_is_left_alone() {
    let config = fast_config();
    let options = MountOptions {
        can_unpark: false,
        ..Default::default()
    };
    let report = run_with_options(&config, options).await;

    assert_no_issues(&report);
    assert!(report
        .for_test("SlewToCoordinates")
        .all(|e| e.outcome == Outcome::Info));
    assert!(report.for_test("AtPark").any(|e| e.message == "true"));
}

#[tokio::test]
async fn extended_tests_measure_motion() {
    let mut config = fast_config();
    config.telescope.extended_rate_offset_tests = true;
    config.telescope.extended_pulse_guide_tests = true;
    let report = run(&config).await;

    assert_no_issues(&report);
    for test in [
        "RightAscensionRate Offset",
        "DeclinationRate Offset",
        "PulseGuide North",
        "PulseGuide South",
        "PulseGuide East",
        "PulseGuide West",
    ] {
        assert!(
            report
                .for_test(test)
                .any(|e| e.outcome == Outcome::Ok && e.message.contains("within")),
            "no measurement for {}",
            test
        );
    }
}

#[tokio::test]
async fn performance_covers_every_member() {
    let mut config = fast_config();
    config.general.performance_tests = true;
    let report = run(&config).await;

    for kind in rp_conform::telescope::PerformanceType::ALL {
        assert!(
            report
                .for_test(kind.name())
                .any(|e| e.message.starts_with("Transaction rate")),
            "no transaction rate for {}",
            kind.name()
        );
    }
}

#[tokio::test]
async fn skipped_tests_are_not_run() {
    let mut config = fast_config();
    config.telescope.skipped_tests = ["FindHome", "Park"].iter().map(|s| s.to_string()).collect();
    let report = run(&config).await;

    assert_no_issues(&report);
    assert!(report
        .for_test("FindHome")
        .any(|e| e.outcome == Outcome::Info && e.message == "Skipped by configuration"));
    assert_eq!(report.for_test("Park While Parked").count(), 0);
    assert_eq!(report.for_test("SlewToCoordinates While Parked").count(), 0);
}

#[tokio::test]
async fn skipping_side_of_pier_is_reported_once() {
    let mut config = fast_config();
    config.telescope.skipped_tests = ["SideOfPier".to_string()].into_iter().collect();
    let report = run(&config).await;

    assert_no_issues(&report);
    assert_eq!(
        report
            .for_test("SideOfPier")
            .filter(|e| e.message == "Skipped by configuration")
            .count(),
        1
    );
    assert_eq!(report.for_test("SideOfPier Model").count(), 0);
    assert_eq!(report.for_test("SideOfPier Write").count(), 0);
}

#[tokio::test]
async fn side_of_pier_write_can_be_skipped_alone() {
    let mut config = fast_config();
    config.telescope.skipped_tests = ["SideOfPier Write".to_string()].into_iter().collect();
    let report = run(&config).await;

    assert_no_issues(&report);
    assert!(report
        .for_test("SideOfPier Model")
        .any(|e| e.outcome == Outcome::Ok && e.message.contains("pointing state")));
    let write: Vec<_> = report.for_test("SideOfPier Write").collect();
    assert_eq!(write.len(), 1);
    assert_eq!(write[0].message, "Skipped by configuration");
}

#[tokio::test]
async fn minimum_wait_covers_a_late_slewing_flag() {
    let mut config = fast_config();
    config.telescope.slew_minimum_wait = Duration::from_millis(500);
    let options = MountOptions {
        slewing_delay: Duration::from_millis(100),
        ..Default::default()
    };
    let report = run_with_options(&config, options).await;

    assert_no_issues(&report);
    for kind in [
        SlewSyncType::SlewToCoordinatesAsync,
        SlewSyncType::SlewToTargetAsync,
        SlewSyncType::SlewToAltAzAsync,
    ] {
        assert!(
            report
                .for_test(kind.name())
                .any(|e| e.outcome == Outcome::Ok && e.message.contains("to within")),
            "{} did not wait for the slew",
            kind
        );
    }
}

#[tokio::test]
async fn late_slewing_flag_without_minimum_wait_misses_the_slew() {
    let config = fast_config();
    let options = MountOptions {
        slewing_delay: Duration::from_millis(200),
        ..Default::default()
    };
    let report = run_with_options(&config, options).await;

    assert!(report
        .issues()
        .any(|e| e.test == "SlewToCoordinatesAsync" && e.message.contains("exceed the")));
}

fn extended_config() -> Config {
    let mut config = fast_config();
    config.telescope.extended_rate_offset_tests = true;
    config.telescope.extended_pulse_guide_tests = true;
    config
}

#[tokio::test]
async fn reversed_pulse_guides_move_the_wrong_way() {
    let options = MountOptions {
        reverse_guiding: true,
        ..Default::default()
    };
    let report = run_with_options(&extended_config(), options).await;

    for direction in ["North", "South", "East", "West"] {
        let test = format!("PulseGuide {}", direction);
        assert!(
            report
                .issues()
                .any(|e| e.test == test && e.message.contains("moved in the wrong direction")),
            "{} was not flagged",
            test
        );
    }
}

#[tokio::test]
async fn scaled_rate_offsets_are_out_of_tolerance() {
    let options = MountOptions {
        rate_offset_scale: 0.5,
        ..Default::default()
    };
    let report = run_with_options(&extended_config(), options).await;

    for test in ["RightAscensionRate Offset", "DeclinationRate Offset"] {
        assert!(
            report
                .issues()
                .any(|e| e.test == test && e.message.contains("outside the 5% tolerance")),
            "{} was not flagged",
            test
        );
    }
}

#[tokio::test]
async fn cross_axis_guiding_motion_is_an_issue() {
    let mut config = extended_config();
    config.telescope.cross_axis_tolerance_arcsec = 0.5;
    let options = MountOptions {
        guide_cross_axis_bleed: 1.0,
        ..Default::default()
    };
    let report = run_with_options(&config, options).await;

    for direction in ["North", "South", "East", "West"] {
        let test = format!("PulseGuide {}", direction);
        assert!(
            report
                .issues()
                .any(|e| e.test == test && e.message.contains("more than the 0.5\" allowed")),
            "{} cross axis motion was not flagged",
            test
        );
    }
}

//! End-to-end operations against a simulated switch console.

mod common;

use std::time::Duration;

use common::{Behavior, CopyReply, FakeSwitch, MemoryTranscripts, ResettingSwitch};
use poststage::channel::{OpenMode, transcript_file_name};
use poststage::driver::{Operation, PostStage, StageBuilder};

const HOST: &str = "10.1.1.20";
const PASSWORD: &str = "s3cr3t-pass";

fn stage(switch: &FakeSwitch, transcripts: &MemoryTranscripts) -> PostStage<FakeSwitch> {
    StageBuilder::new(HOST)
        .username("ansible")
        .password(PASSWORD)
        .transcript_store(transcripts.clone())
        .build_with(switch.clone())
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_copy_bootrom_success() {
    let switch = FakeSwitch::new(Behavior::default());
    let transcripts = MemoryTranscripts::default();

    let result = stage(&switch, &transcripts)
        .copy_bootrom("10.1.1.5", "kxz10101.bin")
        .await;

    assert!(result.changed);
    assert!(!result.failed);
    assert!(result.msg.is_none());

    let state = switch.state();
    assert_eq!(state.connections, 1);
    assert!(state.saw("copy tftp flash 10.1.1.5 kxz10101.bin bootrom"));
    assert!(state.saw("logout"));
    assert!(state.saw(PASSWORD));
}

#[tokio::test(start_paused = true)]
async fn test_copy_flash_saves_config() {
    let switch = FakeSwitch::new(Behavior::default());
    let transcripts = MemoryTranscripts::default();

    let result = stage(&switch, &transcripts).copy_flash_to_secondary().await;

    assert!(result.changed);
    let state = switch.state();
    let flash = state
        .received
        .iter()
        .position(|l| l == "copy flash flash secondary")
        .unwrap();
    let save = state.received.iter().position(|l| l == "write mem").unwrap();
    assert!(flash < save);
}

#[tokio::test(start_paused = true)]
async fn test_end_of_stream_before_login() {
    let switch = FakeSwitch::new(Behavior {
        hang_up_on_connect: true,
        ..Behavior::default()
    });
    let transcripts = MemoryTranscripts::default();

    let result = stage(&switch, &transcripts).generate_ssh_key().await;

    assert!(!result.changed);
    assert!(result.failed);
    assert_eq!(
        result.msg.as_deref(),
        Some("ERROR -- Unable to connect to 10.1.1.20")
    );
    assert_eq!(result.failed_step.as_deref(), Some("login/login-prompt"));
}

#[tokio::test(start_paused = true)]
async fn test_connection_reset_after_username() {
    let transcripts = MemoryTranscripts::default();
    let stage = StageBuilder::new(HOST)
        .username("ansible")
        .password(PASSWORD)
        .transcript_store(transcripts.clone())
        .build_with(ResettingSwitch)
        .unwrap();

    let result = stage.generate_ssh_key().await;

    assert!(!result.changed);
    assert!(result.failed);
    assert_eq!(
        result.msg.as_deref(),
        Some("ERROR -- Unable to connect to 10.1.1.20")
    );
    assert_eq!(result.failed_step.as_deref(), Some("login/username"));
    assert!(transcripts.text().contains("Please Enter Login Name:"));
    assert_eq!(transcripts.log().closes, 1);
}

#[tokio::test(start_paused = true)]
async fn test_connection_refused() {
    let switch = FakeSwitch::new(Behavior {
        refuse_connect: true,
        ..Behavior::default()
    });
    let transcripts = MemoryTranscripts::default();

    let result = stage(&switch, &transcripts).generate_ssh_key().await;

    assert!(result.failed);
    assert_eq!(
        result.msg.as_deref(),
        Some("ERROR -- Unable to connect to 10.1.1.20")
    );
    // Nothing connected, so no transcript was opened.
    assert!(transcripts.log().opens.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_bootrom_timeout() {
    let switch = FakeSwitch::new(Behavior {
        bootrom: CopyReply::Stall,
        ..Behavior::default()
    });
    let transcripts = MemoryTranscripts::default();

    let started = tokio::time::Instant::now();
    let result = stage(&switch, &transcripts)
        .copy_bootrom("10.1.1.5", "kxz10101.bin")
        .await;

    assert!(!result.changed);
    assert!(result.failed);
    assert_eq!(
        result.msg.as_deref(),
        Some("ERROR - Did not get expected values returned on 10.1.1.20")
    );
    assert_eq!(
        result.failed_step.as_deref(),
        Some("copy-bootrom/copy-bootrom")
    );
    assert!(started.elapsed() >= Duration::from_secs(120));
    assert!(!switch.state().saw("logout"));
}

#[tokio::test(start_paused = true)]
async fn test_generate_ssh_key_is_idempotent() {
    let switch = FakeSwitch::new(Behavior {
        sticky_key: true,
        ..Behavior::default()
    });
    let transcripts = MemoryTranscripts::default();
    let stage = stage(&switch, &transcripts);

    let first = stage.generate_ssh_key().await;
    assert!(first.changed);
    assert!(transcripts.text().contains("successfully created"));

    let second = stage.generate_ssh_key().await;
    assert!(second.changed);
    assert!(!second.failed);
    assert!(transcripts.text().contains("Key already exists"));

    let state = switch.state();
    assert_eq!(state.connections, 2);
    assert_eq!(state.keys_created, 1);
    assert_eq!(state.keys_existing, 1);
}

#[tokio::test(start_paused = true)]
async fn test_post_stage_runs_three_sessions() {
    let switch = FakeSwitch::new(Behavior::default());
    let transcripts = MemoryTranscripts::default();

    let operation = Operation::PostStage {
        tftp_server: "10.1.1.5".into(),
        bootrom: "kxz10101.bin".into(),
    };
    let result = stage(&switch, &transcripts).run(&operation).await;

    assert!(result.changed);
    assert_eq!(switch.state().connections, 3);

    let log = transcripts.log();
    assert_eq!(
        log.opens,
        vec![OpenMode::Truncate, OpenMode::Append, OpenMode::Append]
    );
    assert_eq!(log.closes, 3);
}

#[tokio::test(start_paused = true)]
async fn test_post_stage_aborts_after_bootrom_timeout() {
    let switch = FakeSwitch::new(Behavior {
        bootrom: CopyReply::Stall,
        ..Behavior::default()
    });
    let transcripts = MemoryTranscripts::default();

    let result = stage(&switch, &transcripts)
        .post_stage("10.1.1.5", "kxz10101.bin")
        .await;

    assert!(!result.changed);
    assert!(result.failed);
    assert_eq!(
        result.msg.as_deref(),
        Some("ERROR - Did not get expected values returned on 10.1.1.20")
    );
    assert_eq!(
        result.failed_step.as_deref(),
        Some("copy-bootrom/copy-bootrom")
    );

    let state = switch.state();
    assert_eq!(state.connections, 2);
    assert!(state.saw("crypto key generate"));
    assert!(!state.saw("copy flash flash secondary"));
    assert!(!state.saw("write mem"));
}

#[tokio::test(start_paused = true)]
async fn test_post_stage_hang_up_during_flash_copy() {
    let switch = FakeSwitch::new(Behavior {
        flash: CopyReply::HangUp,
        ..Behavior::default()
    });
    let transcripts = MemoryTranscripts::default();

    let result = stage(&switch, &transcripts)
        .post_stage("10.1.1.5", "kxz10101.bin")
        .await;

    assert!(result.failed);
    assert_eq!(
        result.msg.as_deref(),
        Some("ERROR -- Unable to connect to 10.1.1.20")
    );
    assert_eq!(
        result.failed_step.as_deref(),
        Some("copy-flash-to-secondary/copy-flash")
    );
    assert_eq!(transcripts.log().closes, 3);
}

#[tokio::test(start_paused = true)]
async fn test_transcript_closed_once_on_every_path() {
    for behavior in [
        Behavior::default(),
        Behavior {
            bootrom: CopyReply::Stall,
            ..Behavior::default()
        },
        Behavior {
            bootrom: CopyReply::HangUp,
            ..Behavior::default()
        },
    ] {
        let switch = FakeSwitch::new(behavior);
        let transcripts = MemoryTranscripts::default();
        stage(&switch, &transcripts)
            .copy_bootrom("10.1.1.5", "kxz10101.bin")
            .await;

        let log = transcripts.log();
        assert_eq!(log.opens.len(), 1);
        assert_eq!(log.closes, 1, "behavior: {:?}", behavior);
    }
}

#[tokio::test(start_paused = true)]
async fn test_transcript_failure_mid_step() {
    let switch = FakeSwitch::new(Behavior::default());
    // Banner and username go through; recording the username echo fails.
    let transcripts = MemoryTranscripts::failing_after(3);

    let result = stage(&switch, &transcripts)
        .copy_bootrom("10.1.1.5", "kxz10101.bin")
        .await;

    assert!(result.failed);
    assert_eq!(
        result.msg.as_deref(),
        Some("ERROR - Session I/O failed on 10.1.1.20")
    );
    assert_eq!(transcripts.log().closes, 1);
}

#[tokio::test(start_paused = true)]
async fn test_transcript_masks_password() {
    let switch = FakeSwitch::new(Behavior::default());
    let transcripts = MemoryTranscripts::default();

    let result = stage(&switch, &transcripts).generate_ssh_key().await;
    assert!(result.changed);

    let text = transcripts.text();
    assert!(text.contains("Please Enter Password:"));
    assert!(text.contains("********"));
    assert!(!text.contains(PASSWORD));
}

#[tokio::test(start_paused = true)]
async fn test_file_transcript_keeps_every_session() {
    let dir = tempfile::tempdir().unwrap();
    let logs = dir.path().join("post-stage");
    let switch = FakeSwitch::new(Behavior::default());

    let stage = StageBuilder::new(HOST)
        .username("ansible")
        .password(PASSWORD)
        .logfile_directory(&logs)
        .build_with(switch.clone())
        .unwrap();

    let result = stage.post_stage("10.1.1.5", "kxz10101.bin").await;
    assert!(result.changed);

    let text = std::fs::read_to_string(logs.join(transcript_file_name(HOST))).unwrap();
    assert!(text.contains("crypto key generate"));
    assert!(text.contains("TFTP to Flash Done"));
    assert!(text.contains("Flash to Flash Done"));
    assert_eq!(text.matches("Please Enter Login Name:").count(), 3);
    assert!(!text.contains(PASSWORD));

    // A second run starts a fresh transcript.
    let result = stage.generate_ssh_key().await;
    assert!(result.changed);
    let text = std::fs::read_to_string(logs.join(transcript_file_name(HOST))).unwrap();
    assert_eq!(text.matches("Please Enter Login Name:").count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_settle_delay_between_sessions() {
    let switch = FakeSwitch::new(Behavior::default());
    let transcripts = MemoryTranscripts::default();

    let stage = StageBuilder::new(HOST)
        .username("ansible")
        .password(PASSWORD)
        .settle_delay(Duration::from_secs(7))
        .transcript_store(transcripts.clone())
        .build_with(switch.clone())
        .unwrap();

    let started = tokio::time::Instant::now();
    let result = stage.post_stage("10.1.1.5", "kxz10101.bin").await;
    assert!(result.changed);

    // keygen settle + gap + gap + flash settle
    assert!(started.elapsed() >= Duration::from_secs(28));
}

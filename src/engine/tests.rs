use std::time::Duration;

use super::types::{Command, VolumeCtl, coalesce_commands};

fn seek(secs: u64) -> Command {
    Command::Seek {
        to: Duration::from_secs(secs),
    }
}

#[test]
fn coalesce_keeps_only_the_latest_seek() {
    let out = coalesce_commands(vec![seek(5), Command::Pause, seek(9)]);
    assert_eq!(out.len(), 2);
    assert!(matches!(out[0], Command::Pause));
    assert!(matches!(out[1], Command::Seek { to } if to == Duration::from_secs(9)));
}

#[test]
fn coalesce_treats_effect_classes_independently() {
    let out = coalesce_commands(vec![
        Command::SetVolume { volume: 0.1 },
        seek(1),
        Command::SetVolume { volume: 0.9 },
        seek(2),
    ]);
    assert_eq!(out.len(), 2);
    assert!(matches!(out[0], Command::SetVolume { volume } if volume == 0.9));
    assert!(matches!(out[1], Command::Seek { to } if to == Duration::from_secs(2)));
}

#[test]
fn coalesce_leaves_other_commands_alone() {
    let out = coalesce_commands(vec![
        Command::Pause,
        Command::Next,
        Command::Pause,
        Command::Stop,
    ]);
    assert_eq!(out.len(), 4);
}

#[test]
fn unmute_restores_the_exact_pre_mute_volume() {
    let mut ctl = VolumeCtl::new(0.37, false);
    assert!(ctl.toggle_mute());
    assert_eq!(ctl.effective(), 0.0);
    assert!(!ctl.toggle_mute());
    assert_eq!(ctl.effective(), 0.37);

    // Setting volume to zero and unmuting later still restores zero,
    // not some default.
    let mut ctl = VolumeCtl::new(1.0, false);
    ctl.set(0.0);
    ctl.toggle_mute();
    ctl.toggle_mute();
    assert_eq!(ctl.effective(), 0.0);
    assert_eq!(ctl.volume(), 0.0);
}

#[test]
fn volume_is_clamped_and_sanitized() {
    let mut ctl = VolumeCtl::new(2.0, false);
    assert_eq!(ctl.volume(), 1.0);
    assert_eq!(ctl.set(-0.5), 0.0);
    assert_eq!(ctl.set(f32::NAN), 1.0);
}

#[test]
fn volume_changes_while_muted_apply_on_unmute() {
    let mut ctl = VolumeCtl::new(0.8, true);
    assert_eq!(ctl.effective(), 0.0);
    ctl.set(0.25);
    assert_eq!(ctl.effective(), 0.0);
    ctl.toggle_mute();
    assert_eq!(ctl.effective(), 0.25);
}

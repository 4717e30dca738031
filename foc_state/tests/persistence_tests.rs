//! Calibration persistence: round trips, fallback to defaults, store faults.

use foc_common::consts::ERASED_BYTE;
use foc_state::persistence::{self, DefaultReason};
use foc_state::prelude::*;
use proptest::prelude::*;
use tempfile::tempdir;

const CAPACITY: usize = 2048;
const OFFSET: usize = 512;

/// Calibration with every field moved off its default.
fn every_field_tuned() -> Calibration {
    let mut table = CorrectionTable::zeroed();
    for (i, v) in table.iter_mut().enumerate() {
        *v = (i as i32 - 128) as i8;
    }
    Calibration {
        start_sequence: CALIBRATION_MAGIC,
        erev_start: 4321,
        erevs_per_mrev: 14,
        flip_phases: true,
        foc_kp_d: 0.7,
        foc_ki_d: 0.3,
        foc_kp_q: 1.3,
        foc_ki_q: 0.4,
        velocity_kp: 0.2,
        velocity_kd: 0.002,
        position_kp: 7.5,
        position_kd: 0.05,
        current_limit: 4.0,
        torque_limit: 1.5,
        velocity_limit: 40.0,
        position_lower_limit: -3.0,
        position_upper_limit: 3.0,
        motor_resistance: 0.35,
        motor_inductance: 1.2e-4,
        motor_torque_const: 0.08,
        control_timeout: 250,
        hf_velocity_filter_param: 0.02,
        lf_velocity_filter_param: 0.004,
        position_offset: 0.12,
        ia_offset: 0.01,
        ib_offset: -0.02,
        ic_offset: 0.03,
        enc_ang_corr_scale: 0.001,
        enc_ang_corr_offset: -0.5,
        enc_ang_corr_table_values: table,
    }
}

fn memory_store() -> (CalibrationStore, foc_state::store::StoreFaults) {
    let store = MemoryStore::new(CAPACITY);
    let faults = store.faults();
    (CalibrationStore::new(store, OFFSET).unwrap(), faults)
}

fn finite() -> std::ops::Range<f32> {
    -1.0e6f32..1.0e6f32
}

prop_compose! {
    fn arb_calibration()(
        header in (any::<u16>(), any::<u8>(), any::<bool>(), any::<u16>()),
        gains in prop::array::uniform16(finite()),
        filters in prop::array::uniform8(finite()),
        table in prop::collection::vec(any::<i8>(), ENC_ANG_CORR_TABLE_SIZE),
    ) -> Calibration {
        let (erev_start, erevs_per_mrev, flip_phases, control_timeout) = header;
        let mut values = CorrectionTable::zeroed();
        values.copy_from_slice(&table);
        Calibration {
            start_sequence: CALIBRATION_MAGIC,
            erev_start,
            erevs_per_mrev,
            flip_phases,
            foc_kp_d: gains[0],
            foc_ki_d: gains[1],
            foc_kp_q: gains[2],
            foc_ki_q: gains[3],
            velocity_kp: gains[4],
            velocity_kd: gains[5],
            position_kp: gains[6],
            position_kd: gains[7],
            current_limit: gains[8],
            torque_limit: gains[9],
            velocity_limit: gains[10],
            position_lower_limit: gains[11],
            position_upper_limit: gains[12],
            motor_resistance: gains[13],
            motor_inductance: gains[14],
            motor_torque_const: gains[15],
            control_timeout,
            hf_velocity_filter_param: filters[0],
            lf_velocity_filter_param: filters[1],
            position_offset: filters[2],
            ia_offset: filters[3],
            ib_offset: filters[4],
            ic_offset: filters[5],
            enc_ang_corr_scale: filters[6],
            enc_ang_corr_offset: filters[7],
            enc_ang_corr_table_values: values,
        }
    }
}

proptest! {
    #[test]
    fn prop_store_load_roundtrip(cal in arb_calibration()) {
        let (mut nv, _) = memory_store();
        nv.store(&cal).unwrap();

        let mut loaded = Calibration::default();
        prop_assert_eq!(nv.load(&mut loaded).unwrap(), LoadOutcome::Loaded);
        prop_assert_eq!(loaded, cal);
    }

    #[test]
    fn prop_mismatched_magic_yields_defaults(
        magic in any::<u16>().prop_filter("valid magic", |m| *m != CALIBRATION_MAGIC),
        body in prop::collection::vec(any::<u8>(), CALIBRATION_BLOCK_SIZE - 2),
    ) {
        let mut image = vec![ERASED_BYTE; CAPACITY];
        image[OFFSET..OFFSET + 2].copy_from_slice(&magic.to_le_bytes());
        image[OFFSET + 2..OFFSET + CALIBRATION_BLOCK_SIZE].copy_from_slice(&body);
        let mut nv = CalibrationStore::new(MemoryStore::from_image(image), OFFSET).unwrap();

        let mut cal = every_field_tuned();
        let outcome = nv.load(&mut cal).unwrap();
        prop_assert_eq!(outcome, LoadOutcome::Defaulted(DefaultReason::MagicMismatch { found: magic }));
        prop_assert_eq!(cal, Calibration::default());
    }
}

#[test]
fn test_store_load_every_field() {
    let (mut nv, _) = memory_store();
    let cal = every_field_tuned();
    nv.store(&cal).unwrap();

    let mut loaded = Calibration::default();
    assert!(nv.load(&mut loaded).unwrap().is_loaded());
    assert_eq!(loaded, cal);
}

#[test]
fn test_all_zero_store_yields_defaults() {
    let mut nv = CalibrationStore::new(MemoryStore::zeroed(CAPACITY), 0).unwrap();
    let mut cal = every_field_tuned();
    assert_eq!(
        nv.load(&mut cal).unwrap(),
        LoadOutcome::Defaulted(DefaultReason::MagicMismatch { found: 0 })
    );
    assert_eq!(cal, Calibration::default());
}

#[test]
fn test_valid_magic_is_sole_validity_check() {
    let mut image = vec![0u8; CAPACITY];
    let block = persistence::encode(&every_field_tuned()).unwrap();
    image[..CALIBRATION_BLOCK_SIZE].copy_from_slice(&block);
    image[5] = 7; // flip_phases byte outside 0/1
    let mut nv = CalibrationStore::new(MemoryStore::from_image(image), 0).unwrap();

    let mut cal = Calibration::default();
    assert_eq!(nv.load(&mut cal).unwrap(), LoadOutcome::Loaded);
    assert_eq!(cal, every_field_tuned());
    assert_eq!(cal.erev_start, 4321);
    assert_eq!(cal.erevs_per_mrev, 14);
}

#[test]
fn test_write_fault_keeps_previous_block() {
    let (mut nv, faults) = memory_store();
    let original = every_field_tuned();
    nv.store(&original).unwrap();

    faults.set_fail_writes(true);
    let changed = Calibration {
        foc_kp_q: 9.0,
        ..original
    };
    let err = nv.store(&changed).unwrap_err();
    assert!(matches!(err, PersistenceError::Storage(StoreError::WriteFailed { .. })));

    faults.set_fail_writes(false);
    let mut loaded = Calibration::default();
    nv.load(&mut loaded).unwrap();
    assert_eq!(loaded, original);
}

#[test]
fn test_read_fault_leaves_memory_untouched() {
    let (mut nv, faults) = memory_store();
    nv.store(&Calibration::default()).unwrap();

    faults.set_fail_reads(true);
    let mut cal = every_field_tuned();
    let err = nv.load(&mut cal).unwrap_err();
    assert!(matches!(err, PersistenceError::Storage(StoreError::ReadFailed { .. })));
    assert_eq!(cal, every_field_tuned());
}

#[test]
fn test_clear_resets_every_field() {
    let mut cal = every_field_tuned();
    persistence::clear(&mut cal);
    assert_eq!(cal, Calibration::default());
    assert!(cal.is_valid());
}

#[test]
fn test_erase_then_load_yields_defaults() {
    let (mut nv, _) = memory_store();
    nv.store(&every_field_tuned()).unwrap();
    nv.erase().unwrap();

    let mut cal = every_field_tuned();
    assert!(!nv.load(&mut cal).unwrap().is_loaded());
    assert_eq!(cal, Calibration::default());
}

#[test]
fn test_restart_roundtrip_through_file_store() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nvm.bin");

    // First boot: nothing stored yet.
    {
        let mut nv = CalibrationStore::new(FileStore::new(&path, CAPACITY), OFFSET).unwrap();
        let mut cal = Calibration::default();
        assert_eq!(
            nv.load(&mut cal).unwrap(),
            LoadOutcome::Defaulted(DefaultReason::MagicMismatch { found: 0xFFFF })
        );
        nv.store(&every_field_tuned()).unwrap();
    }

    // Second boot: the stored record comes back field for field.
    let mut nv = CalibrationStore::new(FileStore::new(&path, CAPACITY), OFFSET).unwrap();
    let mut cal = Calibration::default();
    assert!(nv.load(&mut cal).unwrap().is_loaded());
    assert_eq!(cal, every_field_tuned());
}

#[test]
fn test_comms_persistence_operations() {
    let (nv, _) = memory_store();
    let (mut control, mut comms) = SharedControlState::new(1).split(nv, NullGate);
    let now = std::time::Instant::now();

    comms.stage_calibration(every_field_tuned()).unwrap();
    comms.store_calibration().unwrap();

    comms.clear_calibration();
    assert_eq!(*comms.calibration(), Calibration::default());

    assert!(comms.load_calibration().unwrap().is_loaded());
    assert_eq!(*comms.calibration(), every_field_tuned());

    comms.erase_calibration().unwrap();
    assert_eq!(*comms.calibration(), every_field_tuned(), "erase leaves memory alone");

    comms.finish_message();
    control.begin_cycle(now);
    assert_eq!(*control.calibration(), every_field_tuned());

    assert!(!comms.load_calibration().unwrap().is_loaded());
    comms.finish_message();
    control.end_cycle();
    control.begin_cycle(now);
    assert_eq!(*control.calibration(), Calibration::default());
}

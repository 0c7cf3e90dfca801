//! DataObject constructors for the per-role schema (spec §4.3 "DataObject
//! schema per verifier"). Kept separate from the verification logic so the
//! shape of each object is reviewable in one place.

use crate::measurement::hex_mr;
use tv_fetchers::tool_exec::MeasuredRegisters;
use tv_types::{Calculation, DataObject};

pub fn main_object(role: &str) -> DataObject {
    DataObject::new(format!("{role}-main"), format!("{role} main"), format!("Top-level summary for the {role} component"))
        .expect("role-main ids always contain a separator")
}

pub fn cpu_object(role: &str, verification_status: &str) -> DataObject {
    DataObject::new(format!("{role}-cpu"), format!("{role} cpu"), "Hardware attestation summary".to_string())
        .expect("valid id")
        .with_field("verification_status", verification_status)
}

pub fn quote_object(role: &str, mrtd: &str, rtmr: &[String; 4]) -> DataObject {
    DataObject::new(format!("{role}-quote"), format!("{role} quote"), "TD10 report registers".to_string())
        .expect("valid id")
        .with_field("mrtd", mrtd)
        .with_field("rtmr0", rtmr[0].clone())
        .with_field("rtmr1", rtmr[1].clone())
        .with_field("rtmr2", rtmr[2].clone())
        .with_field("rtmr3", rtmr[3].clone())
}

pub fn event_log_object(role: &str, imr: u8, replayed: &[u8; 48]) -> DataObject {
    DataObject::new(
        format!("{role}-event-logs-imr{imr}"),
        format!("{role} event log imr{imr}"),
        format!("Replayed RTMR{imr} from the event log"),
    )
    .expect("valid id")
    .with_field("replayed_rtmr", hex_mr(replayed))
    .with_calculation(Calculation {
        inputs: vec!["event_log".to_string()],
        function: "replay_rtmr".to_string(),
        outputs: vec!["replayed_rtmr".to_string()],
    })
}

pub fn os_object(role: &str, measured: &MeasuredRegisters) -> DataObject {
    DataObject::new(format!("{role}-os"), format!("{role} os"), "Measured OS registers".to_string())
        .expect("valid id")
        .with_field("mrtd", measured.mrtd.clone())
        .with_field("rtmr0", measured.rtmr0.clone())
        .with_field("rtmr1", measured.rtmr1.clone())
        .with_field("rtmr2", measured.rtmr2.clone())
}

pub fn os_code_object(role: &str) -> DataObject {
    DataObject::new(format!("{role}-os-code"), format!("{role} os code"), "OS component measurements".to_string())
        .expect("valid id")
        .with_calculation(Calculation {
            inputs: vec!["bios".into(), "kernel".into(), "cmdline".into(), "initrd".into(), "rootfs".into(), "vm_config".into()],
            function: "measure_images".to_string(),
            outputs: vec!["mrtd".into(), "rtmr0".into(), "rtmr1".into(), "rtmr2".into()],
        })
}

pub fn code_object(role: &str, calculated_hash: &str, app_compose: &str) -> DataObject {
    DataObject::new(format!("{role}-code"), format!("{role} code"), "Compose-hash recomputation".to_string())
        .expect("valid id")
        .with_field("compose_file", app_compose)
        .with_field("sha256", calculated_hash)
        .with_calculation(Calculation {
            inputs: vec!["compose_file".to_string()],
            function: "sha256".to_string(),
            outputs: vec!["sha256".to_string()],
        })
}

pub fn gpu_object(role: &str, num_gpus: u32) -> DataObject {
    DataObject::new(format!("{role}-gpu"), format!("{role} gpu"), "NVIDIA GPU topology".to_string())
        .expect("valid id")
        .with_field("num_gpus", num_gpus)
}

pub fn gpu_quote_object(role: &str, payload: &serde_json::Value) -> DataObject {
    DataObject::new(format!("{role}-gpu-quote"), format!("{role} gpu quote"), "NVIDIA attestation payload".to_string())
        .expect("valid id")
        .with_field("payload_present", !payload.is_null())
}

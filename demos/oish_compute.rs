//! Builds a minimal compute oiSH file (spec scenario S1) and hex-dumps it.

use oixx_core::oish::{EshExtension, EshPipelineStage, ShEntry, ShFile, ShSettingsFlags};

fn main() {
    let mut sh = ShFile::create(ShSettingsFlags::empty(), EshExtension::empty()).unwrap();

    sh.add_binary(
        oixx_core::oish::EshBinaryType::Spirv,
        vec![0x03, 0x02, 0x23, 0x07, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
    )
    .unwrap();

    sh.add_entrypoint(ShEntry {
        name: "main".to_string(),
        stage: EshPipelineStage::Compute,
        group_x: 8,
        group_y: 8,
        group_z: 1,
        intersection_size: 0,
        payload_size: 0,
        inputs: 0,
        outputs: 0,
    })
    .unwrap();

    let bytes = sh.write().unwrap();

    println!("oiSH compute shader: {} bytes", bytes.len());
    print!("hex:");
    for (i, b) in bytes.iter().enumerate() {
        if i % 16 == 0 {
            println!();
            print!("  ");
        }
        print!("{:02x} ", b);
    }
    println!();

    let read_back = ShFile::read(&bytes, false).unwrap();
    assert_eq!(read_back.entries.len(), 1);
    assert_eq!(read_back.entries[0].stage, EshPipelineStage::Compute);
    println!("round-trip ok: pipeline = {:?}", read_back.pipeline_type);
}

//! Builds the scalar oiSB layout from spec scenario S2 and hex-dumps it.

use oixx_core::oisb::{SbFile, SbSettingsFlags, SbVarFlag, ESB_TYPE_F32X4, SB_NONE};

fn main() {
    let mut sb = SbFile::create(SbSettingsFlags::empty(), 16).unwrap();
    sb.add_struct("MainStruct", 16, 16).unwrap();
    sb.add_variable_as_type("position", 0, SB_NONE, ESB_TYPE_F32X4, SbVarFlag::empty(), None)
        .unwrap();

    let bytes = sb.write().unwrap();
    println!("oiSB scalar buffer: {} bytes", bytes.len());

    let read_back = SbFile::read(&bytes, false).unwrap();
    println!("{}", read_back.print());
}

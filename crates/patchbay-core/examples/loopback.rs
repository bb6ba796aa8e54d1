//! Cross-connect two cables over the in-memory transport and watch a few
//! messages travel both ways.
//!
//! ```bash
//! cargo run -p patchbay-core --example loopback
//! ```

use patchbay_core::{LoopbackTransport, PatchBay, Result};
use patchbay_midi::MidiEvent;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let mut bay = PatchBay::builder().cables(8).build()?;
    let mut transport = LoopbackTransport::new(8, 1024);

    let keys = bay.cable(0)?;
    let synth = bay.cable(1)?;
    bay.connect_cross(keys, synth)?;

    // A note arriving from the keyboard side, a clock from the synth side.
    transport.feed(keys, &MidiEvent::note_on(0, 60, 100).to_bytes());
    transport.feed(synth, &[0xF8]);

    bay.poll(&mut transport);

    println!("synth received: {:02X?}", transport.sent(synth));
    println!("keys received:  {:02X?}", transport.sent(keys));

    // Direct sends bypass routing and write straight to a cable's output.
    bay.send_note_off(&mut transport, synth, 0, 60, 0)?;
    println!("synth sent:     {:02X?}", transport.sent(synth));
    println!("stats: {:?}", bay.stats());
    Ok(())
}

/*++

Licensed under the Apache-2.0 license.

File Name:

    bypass.rs

Abstract:

    File contains the bypass engine, a plain copy from the fetcher nodes
    into the pusher nodes.

--*/

use super::descriptor::Descriptor;
use super::error::EngineError;
use symcrypto_emu_bus::{Bus, MemoryAccess};

/// Copy the fetcher data into the pusher buffers. Both lists are consumed
/// independently, so node boundaries need not line up. Discard nodes take
/// their share of the stream without being written.
#[tracing::instrument(skip_all, fields(fetcher = fetcher.len(), pusher = pusher.len()))]
pub fn run(
    memory: &mut dyn Bus,
    fetcher: &[Descriptor],
    pusher: &[Descriptor],
) -> Result<(), EngineError> {
    if fetcher.is_empty() || pusher.is_empty() {
        tracing::error!("bypass without fetcher or pusher node");
        Err(EngineError::EmptyChain)?
    }

    let (mut src, mut dst) = (fetcher.iter().peekable(), pusher.iter().peekable());
    let (mut src_offset, mut dst_offset) = (0usize, 0usize);
    while let (Some(from), Some(to)) = (src.peek(), dst.peek()) {
        let len = (from.len() - src_offset).min(to.len() - dst_offset);
        if !to.discard() {
            memory.write_bytes(
                to.data_address.wrapping_add(dst_offset as u32),
                &from.data[src_offset..src_offset + len],
            )?;
        }

        src_offset += len;
        if src_offset >= from.len() {
            src_offset = 0;
            src.next();
        }
        dst_offset += len;
        if dst_offset >= to.len() {
            dst_offset = 0;
            dst.next();
        }
    }
    Ok(())
}

//! Reader → worker → writer pipeline.
//!
//! Readers and workers share bounded channels: any number of reader threads
//! feed one record channel, a pool of worker VMs drains it, and the main
//! thread writes emitted payloads to stdout. Channel capacity is the
//! backpressure on both stages.

use std::cell::RefCell;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use serde_json::Value as Json;
use tracing::{debug, error, warn};

use gx_io::{FeatureReader, FeatureWriter, JsonLinesReader};
use gx_lang::{EmitSink, FeatureCell, Program, RuntimeError, Vm};
use gx_model::Feature;

const CHANNEL_DEPTH: usize = 1024;

pub fn run(
    program: Arc<Program>,
    sources: &[PathBuf],
    workers: usize,
    dump_on_crash: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (feature_tx, feature_rx) = bounded::<Feature>(CHANNEL_DEPTH);
    let (emit_tx, emit_rx) = bounded::<Json>(CHANNEL_DEPTH);

    // Open every source before spawning anything so setup errors abort the
    // whole run instead of surfacing as a half-empty output.
    let mut readers: Vec<(String, Box<dyn FeatureReader + Send>)> = Vec::new();
    if sources.is_empty() {
        readers.push((
            "stdin".to_string(),
            Box::new(JsonLinesReader::new(BufReader::new(io::stdin()))),
        ));
    } else {
        for path in sources {
            readers.push((path.display().to_string(), gx_io::open(path)?));
        }
    }

    let mut handles = Vec::new();
    for (label, mut reader) in readers {
        let tx = feature_tx.clone();
        handles.push(thread::spawn(move || match reader.read(&tx) {
            Ok(count) => debug!("{label}: {count} features read"),
            Err(err) => error!("{label}: {err}"),
        }));
    }
    drop(feature_tx);

    for id in 0..workers {
        let rx = feature_rx.clone();
        let tx = emit_tx.clone();
        let program = Arc::clone(&program);
        handles.push(thread::spawn(move || {
            worker_loop(id, program, rx, tx, dump_on_crash);
        }));
    }
    drop(feature_rx);
    drop(emit_tx);

    // Drain emitted payloads on this thread; the loop ends once every
    // worker has hung up.
    let mut writer = FeatureWriter::new(io::stdout().lock());
    for value in emit_rx {
        writer.write(&value)?;
    }
    writer.flush()?;

    for handle in handles {
        let _ = handle.join();
    }
    Ok(())
}

/// One worker: a private VM over the shared program. A faulting record is
/// logged and dropped; the VM resets itself for the next one.
fn worker_loop(
    id: usize,
    program: Arc<Program>,
    rx: Receiver<Feature>,
    tx: Sender<Json>,
    dump_on_crash: bool,
) {
    let mut vm = Vm::new(program);
    vm.set_dump_on_crash(dump_on_crash);
    let mut sink = ChannelSink(tx);
    for feature in rx {
        let record: FeatureCell = Rc::new(RefCell::new(feature));
        match vm.run(&record, &mut sink) {
            Ok(()) => {}
            Err(RuntimeError::OutputClosed) => break,
            Err(err) => warn!("worker {id}: record dropped: {err}"),
        }
    }
}

struct ChannelSink(Sender<Json>);

impl EmitSink for ChannelSink {
    fn emit(&mut self, value: Json) -> Result<(), RuntimeError> {
        self.0.send(value).map_err(|_| RuntimeError::OutputClosed)
    }
}

//! Example: parallel writers feeding a single mapper
//!
//! Worker threads claim physical pages concurrently and ship
//! `(sector, address)` pairs over a channel; one mapper thread owns all
//! translation table writes.

use crossbeam_channel::bounded;
use page_ftl::{DeviceAddress, Geometry, PageFtl};
use std::sync::Arc;
use std::thread;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    println!("=== Page FTL: Parallel Writers ===\n");

    let geometry = Geometry::new(4096, 32, 16);
    let ftl = Arc::new(PageFtl::with_geometry(geometry)?);
    let (tx, rx) = bounded::<(u64, DeviceAddress)>(64);

    let writers: Vec<_> = (0..4u64)
        .map(|worker| {
            let ftl = Arc::clone(&ftl);
            let tx = tx.clone();
            thread::spawn(move || {
                for i in 0..100u64 {
                    let sector = (worker * 100 + i) * 4096;
                    let addr = ftl.get_free_page();
                    if addr.is_empty() {
                        println!("[Writer {}] device full at sector {}", worker, sector);
                        break;
                    }
                    if tx.send((sector, addr)).is_err() {
                        break;
                    }
                }
            })
        })
        .collect();
    drop(tx);

    let mapper_ftl = Arc::clone(&ftl);
    let mapper = thread::spawn(move || {
        let mut mapped = 0usize;
        for (sector, addr) in rx {
            if mapper_ftl.update_map(sector, addr.raw()).is_ok() {
                mapped += 1;
            }
        }
        mapped
    });

    for writer in writers {
        writer.join().expect("writer panicked");
    }
    let mapped = mapper.join().expect("mapper panicked");

    let stats = ftl.profiler().stats();
    println!("\n=== Statistics ===");
    println!("Pages mapped:          {}", mapped);
    println!("Pages allocated:       {}", stats.pages_allocated);
    println!("Allocation failures:   {}", stats.allocation_failures);
    println!("Avg probes per alloc:  {:.2}", stats.avg_probes());
    println!("Free pages left:       {}", ftl.free_pages());

    Ok(())
}

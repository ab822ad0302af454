use std::collections::BTreeMap;
use std::sync::{Arc, Barrier};
use std::thread;

use quarry_local::{FileTrackingFileManager, TrackingFileManager};

#[test]
fn concurrent_updates_with_disjoint_keys_are_all_kept() {
    const THREADS: usize = 8;
    const KEYS_PER_THREAD: usize = 16;

    let tmp = tempfile::tempdir().unwrap();
    let path = Arc::new(tmp.path().join("org/example/demo/1.0/_remote.repositories"));
    let manager = Arc::new(FileTrackingFileManager::new());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|thread_idx| {
            let path = Arc::clone(&path);
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for key_idx in 0..KEYS_PER_THREAD {
                    let updates = BTreeMap::from([(
                        format!("t{thread_idx}-k{key_idx}"),
                        Some(format!("{thread_idx}:{key_idx}")),
                    )]);
                    manager.update(&path, &updates).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let props = manager.read(&path).unwrap().expect("tracking file exists");
    assert_eq!(props.len(), THREADS * KEYS_PER_THREAD);
    assert_eq!(props["t3-k7"], "3:7");
}

#[test]
fn equivalent_spellings_of_a_path_serialize_against_each_other() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("repo/org/example");
    std::fs::create_dir_all(&dir).unwrap();
    let plain = dir.join("demo.jar.lastUpdated");
    let dotted = tmp
        .path()
        .join("repo/org/../org/example/demo.jar.lastUpdated");

    let manager = FileTrackingFileManager::new();
    let handles: Vec<_> = [plain.clone(), dotted]
        .into_iter()
        .enumerate()
        .map(|(idx, path)| {
            thread::spawn(move || {
                for key_idx in 0..32 {
                    let updates =
                        BTreeMap::from([(format!("p{idx}-{key_idx}"), Some(String::new()))]);
                    manager.update(&path, &updates).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(manager.read(&plain).unwrap().unwrap().len(), 64);
}

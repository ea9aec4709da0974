//! End-to-end scenarios from spec.md section 8, driven through the public
//! `Filesystem` API with real OS threads (there is no other concurrency
//! primitive in this crate — see spec.md section 5: "all blocking is on
//! locks").

use std::sync::Arc;
use std::thread;

use tfs::{Filesystem, OpenFlags, MAX_DIR_ENTRIES};

#[test]
fn create_write_read_back() {
    let fs = Filesystem::new().unwrap();
    let h = fs.open("/a", OpenFlags::CREAT).unwrap();
    assert_eq!(fs.write(h, b"hello").unwrap(), 5);
    fs.close(h).unwrap();

    let h2 = fs.open("/a", OpenFlags::empty()).unwrap();
    let mut buf = [0u8; 5];
    assert_eq!(fs.read(h2, &mut buf).unwrap(), 5);
    assert_eq!(&buf, b"hello");
    fs.close(h2).unwrap();
}

#[test]
fn direct_indirect_straddle() {
    let fs = Filesystem::new().unwrap();
    let h = fs.open("/big", OpenFlags::CREAT).unwrap();
    let payload = vec![b'X'; 10 * 1024 + 1024];
    assert_eq!(fs.write(h, &payload).unwrap(), payload.len());
    fs.close(h).unwrap();

    let h2 = fs.open("/big", OpenFlags::empty()).unwrap();
    let mut out = vec![0u8; 11264];
    assert_eq!(fs.read(h2, &mut out).unwrap(), 11264);
    assert!(out.iter().all(|&b| b == b'X'));
    fs.close(h2).unwrap();
}

#[test]
fn concurrent_opens_yield_unique_handles() {
    let fs = Arc::new(Filesystem::new().unwrap());
    fs.open("/f1", OpenFlags::CREAT).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let fs = Arc::clone(&fs);
            thread::spawn(move || fs.open("/f1", OpenFlags::empty()).unwrap())
        })
        .collect();

    let mut results: Vec<usize> = handles.into_iter().map(|t| t.join().unwrap()).collect();
    results.sort_unstable();
    let before_dedup = results.len();
    results.dedup();
    assert_eq!(results.len(), before_dedup, "every thread must get a distinct handle");
    assert_eq!(results.len(), 8);
}

#[test]
fn concurrent_reads_preserve_total_bytes() {
    // Two threads race to read the same handle, each asking for the whole
    // file. The handle's mutex (spec.md section 5: "writes to a single file
    // are serialized by the open-file entry lock") means exactly one of
    // them sees the full N bytes and the other sees 0, or they interleave
    // under the shared offset — either way the two counts must sum to N.
    let fs = Arc::new(Filesystem::new().unwrap());
    let n = 100_000;
    let h = fs.open("/v", OpenFlags::CREAT).unwrap();
    fs.write(h, &vec![b'V'; n]).unwrap();
    fs.close(h).unwrap();

    let handle = fs.open("/v", OpenFlags::empty()).unwrap();
    let fs1 = Arc::clone(&fs);
    let fs2 = Arc::clone(&fs);

    let t1 = thread::spawn(move || {
        let mut buf = vec![0u8; n];
        fs1.read(handle, &mut buf).unwrap()
    });
    let t2 = thread::spawn(move || {
        let mut buf = vec![0u8; n];
        fs2.read(handle, &mut buf).unwrap()
    });

    let total = t1.join().unwrap() + t2.join().unwrap();
    assert_eq!(total, n);
}

#[test]
fn truncate_resets_then_read_fails_until_new_content() {
    let fs = Filesystem::new().unwrap();
    let h = fs.open("/t", OpenFlags::CREAT).unwrap();
    fs.write(h, b"abc").unwrap();
    fs.close(h).unwrap();

    let h2 = fs.open("/t", OpenFlags::TRUNC).unwrap();
    // size == 0 after TRUNC, so to_read == 0: the read contract (spec.md
    // section 4.5) only fails on n == 0, not on nothing-available, matching
    // `tecnicofs`'s direct-region reader returning 0 rather than -1.
    let mut buf = [0u8; 1];
    assert_eq!(fs.read(h2, &mut buf).unwrap(), 0);

    fs.write(h2, b"z").unwrap();
    fs.close(h2).unwrap();

    let h3 = fs.open("/t", OpenFlags::empty()).unwrap();
    let mut buf = [0u8; 1];
    assert_eq!(fs.read(h3, &mut buf).unwrap(), 1);
    assert_eq!(&buf, b"z");
}

#[test]
fn directory_full_shadows_inode_table_exhaustion() {
    // The root directory's single block holds far fewer entries
    // (MAX_DIR_ENTRIES) than the inode table has slots (INODE_TABLE_SIZE),
    // so creating through the public `open(CREAT)` surface always exhausts
    // the directory first; see DESIGN.md's Open Question resolution.
    let fs = Filesystem::new().unwrap();
    for i in 0..MAX_DIR_ENTRIES {
        fs.open(&format!("/f{i}"), OpenFlags::CREAT).unwrap();
    }
    assert!(fs.open("/overflow", OpenFlags::CREAT).is_err());
}

#[test]
fn round_trip_arbitrary_payload_through_fresh_open() {
    let fs = Filesystem::new().unwrap();
    let payload: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();

    let h = fs.open("/rt", OpenFlags::CREAT).unwrap();
    assert_eq!(fs.write(h, &payload).unwrap(), payload.len());
    fs.close(h).unwrap();

    let h2 = fs.open("/rt", OpenFlags::empty()).unwrap();
    let mut out = vec![0u8; payload.len()];
    assert_eq!(fs.read(h2, &mut out).unwrap(), payload.len());
    assert_eq!(out, payload);
}

#[test]
fn copy_to_external_matches_source_contents() {
    let fs = Filesystem::new().unwrap();
    let h = fs.open("/src", OpenFlags::CREAT).unwrap();
    let payload = vec![b'm'; 2500];
    fs.write(h, &payload).unwrap();
    fs.close(h).unwrap();

    let mut sink = Vec::new();
    fs.copy_to_external("/src", &mut sink).unwrap();
    assert_eq!(sink, payload);
}

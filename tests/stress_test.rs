use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::tempdir;
use verset::SettingsStore;

#[test]
fn test_concurrent_access() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempdir().unwrap();
    let store = Arc::new(SettingsStore::new(dir.path().join("settings")));

    let notified = Arc::new(AtomicUsize::new(0));
    let counter = notified.clone();
    store.subscribe("shared", move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let barrier = Arc::new(Barrier::new(10));
    let mut handles = vec![];

    for i in 0..10 {
        let s = Arc::clone(&store);
        let b = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            b.wait();
            for j in 0..100 {
                if i % 2 == 0 {
                    let _ = s.get::<u32>("shared");
                    let _ = s.has(&format!("thread.{i}"));
                } else {
                    s.set("shared", &(i * 1000 + j)).unwrap();
                    s.set(&format!("thread.{i}"), &j).unwrap();
                }
                if j % 25 == 0 {
                    s.save().unwrap();
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(notified.load(Ordering::SeqCst), 5 * 100);
    for i in [1, 3, 5, 7, 9] {
        assert_eq!(store.get::<u32>(&format!("thread.{i}")), 99);
    }

    store.save().unwrap();
    let reloaded = SettingsStore::open(dir.path().join("settings")).unwrap();
    assert_eq!(reloaded.keys(), store.keys());
    assert_eq!(reloaded.raw("shared"), store.raw("shared"));
}

#[test]
fn test_concurrent_default_population() {
    let store = Arc::new(SettingsStore::new("unused"));
    let fired = Arc::new(AtomicUsize::new(0));
    let key_counter = fired.clone();
    store.subscribe("upload.connections", move || {
        key_counter.fetch_add(1, Ordering::SeqCst);
    });
    let any_fired = Arc::new(AtomicUsize::new(0));
    let any_counter = any_fired.clone();
    store.on_change(move |_| {
        any_counter.fetch_add(1, Ordering::SeqCst);
    });

    let barrier = Arc::new(Barrier::new(8));
    let mut handles = vec![];

    for _ in 0..8 {
        let s = Arc::clone(&store);
        let b = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            b.wait();
            s.get_or_set_default("upload.connections", 4u32).unwrap()
        }));
    }

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 4);
    }
    assert_eq!(store.get::<u32>("upload.connections"), 4);
    // Only the thread that stored the default notifies
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(any_fired.load(Ordering::SeqCst), 1);
}

#![no_main]
use libfuzzer_sys::fuzz_target;
use vivo_fluent::conversation::MessageCleaner;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let cleaner = MessageCleaner::default();
        let once = cleaner.clean(s);
        // Cleaning is idempotent.
        assert_eq!(cleaner.clean(&once), once);
    }
});

#![no_main]
use libfuzzer_sys::fuzz_target;
use vivo_fluent::replay::ScriptStep;
use vivo_fluent::voice::ProviderMessage;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Malformed wire messages and script lines must never panic.
        if let Some(message) = ProviderMessage::parse(s) {
            let _ = message.into_event();
        }
        let _ = ScriptStep::parse(s);
    }
});

#[macro_use]
extern crate afl;

use sm64_extract::mio0;
use sm64_extract::scan::{ScanRegion, Scanner};

fn main() {
    fuzz!(|data: &[u8]| {
        for header in Scanner::new(data, ScanRegion::whole(data)) {
            let candidate = match header.validate(data.len()) {
                Ok(candidate) => candidate,
                Err(_) => continue,
            };

            if let Ok(decoded) = mio0::decode(data, &candidate) {
                assert_eq!(decoded.len(), candidate.declared_len() as usize);
            }

            let strict = mio0::decode_with(data, &candidate, mio0::BackrefPolicy::Strict);
            if let Ok(decoded) = strict {
                assert_eq!(Ok(decoded), mio0::decode(data, &candidate));
            }
        }
    })
}

/*!
# htj2k-rs

`htj2k-rs` is a pure Rust implementation of the High-Throughput JPEG 2000
(HTJ2K) code-block entropy coder defined by ISO/IEC 15444-15 / ITU-T T.814.
It transforms rectangular arrays of signed wavelet coefficients into
self-contained compressed segments and back, bit-exactly.

The crate covers the block layer only: the HT cleanup pass with its MagSgn,
MEL, and VLC byte streams, the U-VLC residual coder, the context and
exponent predictors, and the segment layout. DWT, quantization, and Tier-2
packet assembly are the caller's concern; code-blocks are independent, so
callers may process many blocks concurrently.

## Example

```
use htj2k_rs::htj2k::block_coder::{new_block_codec, BlockCodecKind};

let codec = new_block_codec(BlockCodecKind::HighThroughput, 4, 4).unwrap();
let coeffs: Vec<i32> = (0..16).map(|i| i - 8).collect();
let segment = codec.encode(&coeffs).unwrap();
assert_eq!(codec.decode(&segment).unwrap(), coeffs);
```

## Safety

Pure safe Rust; the hot paths rely on precomputed lookup tables rather
than unsafe tricks.
*/

pub mod coding_parameters;
pub mod error;
pub mod htj2k;

pub use coding_parameters::{HtCodingParameters, ProgressionOrder};
pub use error::HtError;
pub use htj2k::block_coder::{new_block_codec, BlockCodec, BlockCodecKind};
pub use htj2k::decoder::HtBlockDecoder;
pub use htj2k::encoder::HtBlockEncoder;

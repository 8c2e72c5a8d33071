//! The TEA-variant block cipher behind XNL authentication.
//!
//! A 32-round Feistel network over two big-endian 32-bit halves, keyed with
//! four 32-bit words and a custom delta constant. The delta is *not* the
//! textbook `0x9E3779B9`; both the key material and the delta are supplied
//! by the caller as opaque configuration. All arithmetic wraps modulo 2^32,
//! and the key words are read little-endian from the 16-byte key regardless
//! of host endianness.

const ROUNDS: u32 = 32;

/// Key material plus delta for one cipher instance.
#[derive(Clone, Copy)]
pub struct TeaKey {
	words: [u32; 4],
	delta: u32,
}

impl core::fmt::Debug for TeaKey {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		// key material stays out of logs
		f.write_str("TeaKey { .. }")
	}
}

impl TeaKey {
	/// Loads the four key words little-endian from `key`.
	pub fn new(key: &[u8; 16], delta: u32) -> Self {
		let mut words = [0u32; 4];
		for (word, chunk) in words.iter_mut().zip(key.chunks_exact(4)) {
			*word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
		}
		Self { words, delta }
	}

	/// Encrypts one 8-byte block.
	pub fn encrypt_block(&self, block: [u8; 8]) -> [u8; 8] {
		let [k0, k1, k2, k3] = self.words;
		let mut v0 = u32::from_be_bytes([block[0], block[1], block[2], block[3]]);
		let mut v1 = u32::from_be_bytes([block[4], block[5], block[6], block[7]]);
		let mut sum = 0u32;

		for _ in 0..ROUNDS {
			sum = sum.wrapping_add(self.delta);
			v0 = v0.wrapping_add(
				(v1 << 4).wrapping_add(k0) ^ v1.wrapping_add(sum) ^ (v1 >> 5).wrapping_add(k1),
			);
			v1 = v1.wrapping_add(
				(v0 << 4).wrapping_add(k2) ^ v0.wrapping_add(sum) ^ (v0 >> 5).wrapping_add(k3),
			);
		}

		let mut out = [0u8; 8];
		out[..4].copy_from_slice(&v0.to_be_bytes());
		out[4..].copy_from_slice(&v1.to_be_bytes());
		out
	}

	/// Decrypts one 8-byte block.
	pub fn decrypt_block(&self, block: [u8; 8]) -> [u8; 8] {
		let [k0, k1, k2, k3] = self.words;
		let mut v0 = u32::from_be_bytes([block[0], block[1], block[2], block[3]]);
		let mut v1 = u32::from_be_bytes([block[4], block[5], block[6], block[7]]);
		let mut sum = self.delta.wrapping_mul(ROUNDS);

		for _ in 0..ROUNDS {
			v1 = v1.wrapping_sub(
				(v0 << 4).wrapping_add(k2) ^ v0.wrapping_add(sum) ^ (v0 >> 5).wrapping_add(k3),
			);
			v0 = v0.wrapping_sub(
				(v1 << 4).wrapping_add(k0) ^ v1.wrapping_add(sum) ^ (v1 >> 5).wrapping_add(k1),
			);
			sum = sum.wrapping_sub(self.delta);
		}

		let mut out = [0u8; 8];
		out[..4].copy_from_slice(&v0.to_be_bytes());
		out[4..].copy_from_slice(&v1.to_be_bytes());
		out
	}

	/// Encrypts 32 bytes of radio key material as four independent 8-byte
	/// blocks (ECB, no chaining), producing the security unlock token.
	pub fn encrypt_key_material(&self, material: &[u8; 32]) -> [u8; 32] {
		let mut out = [0u8; 32];
		for (dst, src) in out.chunks_exact_mut(8).zip(material.chunks_exact(8)) {
			let mut block = [0u8; 8];
			block.copy_from_slice(src);
			dst.copy_from_slice(&self.encrypt_block(block));
		}
		out
	}
}

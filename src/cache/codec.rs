//! 缓存值编解码
//!
//! 每个键命名空间只存一种结构，用 serde_json 编码成字节。解码失败由调用方当作未命中处理。

use serde::{Serialize, de::DeserializeOwned};

pub type CodecError = serde_json::Error;

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(value)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(bytes)
}

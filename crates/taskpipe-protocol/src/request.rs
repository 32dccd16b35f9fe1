use crate::{ProtocolError, Result};
use bytes::{Buf, BufMut, BytesMut};
use taskpipe_core::{ClientId, Task, RESULT_UNSET};
use tokio_util::codec::{Decoder, Encoder};

/// Size of one request record on the public channel.
pub const REQUEST_WIRE_SIZE: usize = 24;

/// Fixed-size request record sent over the public channel.
///
/// Wire layout, big-endian:
/// `[request_id: i32] [client_pid: i32] [client_tid: u64] [workload: i32] [result: i32]`
///
/// `result` is unset (-1) on submission; the field exists so the record
/// layout matches the response side of the contract. Records are written
/// whole and are far below `PIPE_BUF`, so concurrent submitters never
/// interleave bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub request_id: i32,
    pub client_pid: i32,
    pub client_tid: u64,
    pub workload: i32,
    pub result: i32,
}

impl Request {
    /// Build a submission record for the given client identity.
    pub fn new(request_id: i32, client: ClientId, workload: i32) -> Self {
        Request {
            request_id,
            client_pid: client.pid,
            client_tid: client.tid,
            workload,
            result: RESULT_UNSET,
        }
    }

    pub fn client(&self) -> ClientId {
        ClientId::new(self.client_pid, self.client_tid)
    }

    /// Admit the record as a queued task.
    pub fn into_task(self) -> Task {
        Task::new(self.request_id, self.client(), self.workload)
    }
}

/// Codec for the public channel's fixed-size request records.
pub struct RequestCodec;

impl Decoder for RequestCodec {
    type Item = Request;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        // Wait for one complete record
        if src.len() < REQUEST_WIRE_SIZE {
            src.reserve(REQUEST_WIRE_SIZE - src.len());
            return Ok(None);
        }

        let request = Request {
            request_id: src.get_i32(),
            client_pid: src.get_i32(),
            client_tid: src.get_u64(),
            workload: src.get_i32(),
            result: src.get_i32(),
        };

        Ok(Some(request))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match self.decode(src)? {
            Some(record) => Ok(Some(record)),
            None if src.is_empty() => Ok(None),
            None => Err(ProtocolError::TruncatedRecord(src.len())),
        }
    }
}

impl Encoder<Request> for RequestCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Request, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(REQUEST_WIRE_SIZE);
        dst.put_i32(item.request_id);
        dst.put_i32(item.client_pid);
        dst.put_u64(item.client_tid);
        dst.put_i32(item.workload);
        dst.put_i32(item.result);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_roundtrip() {
        let mut codec = RequestCodec;
        let mut buffer = BytesMut::new();

        let request = Request::new(3, ClientId::new(1234, 77), 5);

        codec.encode(request, &mut buffer).unwrap();
        assert_eq!(buffer.len(), REQUEST_WIRE_SIZE);

        let decoded = codec.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(decoded, request);
        assert_eq!(decoded.result, RESULT_UNSET);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_partial_record() {
        let mut codec = RequestCodec;
        let mut buffer = BytesMut::new();

        codec
            .encode(Request::new(1, ClientId::new(10, 1), 2), &mut buffer)
            .unwrap();

        // Keep only the first half of the record
        let mut partial = buffer.split_to(REQUEST_WIRE_SIZE / 2);

        // Should return None (waiting for more data)
        assert!(codec.decode(&mut partial).unwrap().is_none());

        // At EOF the leftover bytes are a hard error
        let err = codec.decode_eof(&mut partial).unwrap_err();
        assert!(matches!(err, ProtocolError::TruncatedRecord(_)));
    }

    #[test]
    fn test_back_to_back_records() {
        let mut codec = RequestCodec;
        let mut buffer = BytesMut::new();

        let first = Request::new(1, ClientId::new(10, 1), 2);
        let second = Request::new(2, ClientId::new(10, 1), 4);
        codec.encode(first, &mut buffer).unwrap();
        codec.encode(second, &mut buffer).unwrap();

        assert_eq!(codec.decode(&mut buffer).unwrap(), Some(first));
        assert_eq!(codec.decode(&mut buffer).unwrap(), Some(second));
        assert_eq!(codec.decode(&mut buffer).unwrap(), None);
    }

    #[test]
    fn test_into_task() {
        let request = Request::new(9, ClientId::new(55, 3), 7);
        let task = request.into_task();
        assert_eq!(task.request_id, 9);
        assert_eq!(task.client, ClientId::new(55, 3));
        assert_eq!(task.workload, 7);
        assert_eq!(task.result, None);
    }
}

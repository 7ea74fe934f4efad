use tokio_util::codec::{Decoder, Encoder};
use bytes::{Buf, BufMut, BytesMut};
use std::io::{Error, ErrorKind};

use tracing::debug;

// encode and decode bypass traditional libraries
// like serde or message pack -- every message travels
// as one fixed-size frame: a 4 byte kind discriminant
// followed by a fixed-capacity payload buffer.
// Both peers must agree on the frame size, there is no
// length prefix on the wire.

pub const PAYLOAD_CAPACITY: usize = 1024;
pub const KIND_LEN: usize = 4;
pub const FRAME_LEN: usize = KIND_LEN + PAYLOAD_CAPACITY;

const AUTH_REQUEST: u32 = 0;
const AUTH_SUCCESS: u32 = 1;
const AUTH_FAILURE: u32 = 2;
const QUESTION_DELIVERY: u32 = 3;
const ANSWER_SUBMISSION: u32 = 4;
const FEEDBACK_CORRECT: u32 = 5;
const FEEDBACK_INCORRECT: u32 = 6;
const ACTIVE_STUDENTS_UPDATE: u32 = 7;
const EXAM_ENDED: u32 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExamMsg {
    AuthRequest(Vec<u8>), // 0, proposed username
    AuthSuccess, // 1
    AuthFailure(Vec<u8>), // 2, human readable reason
    QuestionDelivery(Vec<u8>), // 3, question text
    AnswerSubmission(Vec<u8>), // 4, answer text
    FeedbackCorrect(Vec<u8>), // 5
    FeedbackIncorrect(Vec<u8>), // 6
    ActiveStudentsUpdate(Vec<u8>), // 7, space joined usernames
    ExamEnded(Vec<u8>), // 8, reason text (normal end or capacity reject)
}

impl ExamMsg {
    fn kind(&self) -> u32 {
        match self {
            ExamMsg::AuthRequest(_) => AUTH_REQUEST,
            ExamMsg::AuthSuccess => AUTH_SUCCESS,
            ExamMsg::AuthFailure(_) => AUTH_FAILURE,
            ExamMsg::QuestionDelivery(_) => QUESTION_DELIVERY,
            ExamMsg::AnswerSubmission(_) => ANSWER_SUBMISSION,
            ExamMsg::FeedbackCorrect(_) => FEEDBACK_CORRECT,
            ExamMsg::FeedbackIncorrect(_) => FEEDBACK_INCORRECT,
            ExamMsg::ActiveStudentsUpdate(_) => ACTIVE_STUDENTS_UPDATE,
            ExamMsg::ExamEnded(_) => EXAM_ENDED,
        }
    }

    pub fn payload(&self) -> &[u8] {
        match self {
            ExamMsg::AuthSuccess => &[],
            ExamMsg::AuthRequest(p) | ExamMsg::AuthFailure(p) |
            ExamMsg::QuestionDelivery(p) | ExamMsg::AnswerSubmission(p) |
            ExamMsg::FeedbackCorrect(p) | ExamMsg::FeedbackIncorrect(p) |
            ExamMsg::ActiveStudentsUpdate(p) | ExamMsg::ExamEnded(p) => p,
        }
    }
}

pub struct ExamCodec; // unit struct

// convert a full fixed-size frame into an ExamMsg
impl Decoder for ExamCodec {
    type Item = ExamMsg;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < FRAME_LEN {
            // partial frame mid-stream, wait for the rest
            src.reserve(FRAME_LEN - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(FRAME_LEN);
        let kind = frame.get_u32();
        let payload = unpad(&frame);

        let msg = match kind {
            AUTH_REQUEST => ExamMsg::AuthRequest(payload),
            AUTH_SUCCESS => ExamMsg::AuthSuccess,
            AUTH_FAILURE => ExamMsg::AuthFailure(payload),
            QUESTION_DELIVERY => ExamMsg::QuestionDelivery(payload),
            ANSWER_SUBMISSION => ExamMsg::AnswerSubmission(payload),
            FEEDBACK_CORRECT => ExamMsg::FeedbackCorrect(payload),
            FEEDBACK_INCORRECT => ExamMsg::FeedbackIncorrect(payload),
            ACTIVE_STUDENTS_UPDATE => ExamMsg::ActiveStudentsUpdate(payload),
            EXAM_ENDED => ExamMsg::ExamEnded(payload),
            k => {
                debug!("unknown frame discriminant {}", k);
                return Err(Error::new(ErrorKind::InvalidData, "unknown frame discriminant"));
            }
        };

        Ok(Some(msg))
    }

    // a short read left dangling at stream end means the peers
    // disagree on the frame size -- fatal, no partial frame recovery
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(Error::new(ErrorKind::InvalidData, "partial frame at stream end")),
        }
    }
}

// Take an ExamMsg and write it as one fixed-size frame
impl Encoder<ExamMsg> for ExamCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: ExamMsg, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = item.payload();

        if payload.len() > PAYLOAD_CAPACITY {
            return Err(Error::new(ErrorKind::InvalidInput, "payload exceeds frame capacity"));
        }

        dst.reserve(FRAME_LEN);
        dst.put_u32(item.kind());
        dst.extend_from_slice(payload);
        dst.put_bytes(0, PAYLOAD_CAPACITY - payload.len());
        Ok(())
    }
}

// payload text is NUL terminated within the buffer when shorter
// than the capacity; a full-capacity payload has no terminator
fn unpad(buf: &[u8]) -> Vec<u8> {
    let end = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
    buf[..end].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_one(bytes: &[u8]) -> Result<Option<ExamMsg>, std::io::Error> {
        let mut src = BytesMut::from(bytes);
        ExamCodec.decode(&mut src)
    }

    #[test]
    fn encodes_fixed_size_frame() {
        let mut dst = BytesMut::new();
        ExamCodec.encode(ExamMsg::AuthRequest(b"student1".to_vec()), &mut dst).unwrap();

        assert_eq!(dst.len(), FRAME_LEN);
        assert_eq!(&dst[..KIND_LEN], &0u32.to_be_bytes());
        assert_eq!(&dst[KIND_LEN..KIND_LEN + 8], b"student1");
        assert!(dst[KIND_LEN + 8..].iter().all(|b| *b == 0));
    }

    #[test]
    fn decodes_payload_up_to_terminator() {
        let mut dst = BytesMut::new();
        ExamCodec.encode(ExamMsg::AnswerSubmission(b"b".to_vec()), &mut dst).unwrap();

        let msg = decode_one(&dst).unwrap().unwrap();
        assert_eq!(msg, ExamMsg::AnswerSubmission(b"b".to_vec()));
    }

    #[test]
    fn full_capacity_payload_round_trips() {
        let payload = vec![b'x'; PAYLOAD_CAPACITY];
        let mut dst = BytesMut::new();
        ExamCodec.encode(ExamMsg::QuestionDelivery(payload.clone()), &mut dst).unwrap();

        let msg = decode_one(&dst).unwrap().unwrap();
        assert_eq!(msg, ExamMsg::QuestionDelivery(payload));
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let payload = vec![b'x'; PAYLOAD_CAPACITY + 1];
        let mut dst = BytesMut::new();
        let err = ExamCodec.encode(ExamMsg::ExamEnded(payload), &mut dst).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn partial_frame_waits_for_more_bytes() {
        let mut dst = BytesMut::new();
        ExamCodec.encode(ExamMsg::AuthSuccess, &mut dst).unwrap();

        let mut src = BytesMut::from(&dst[..FRAME_LEN - 1]);
        assert!(ExamCodec.decode(&mut src).unwrap().is_none());
    }

    #[test]
    fn partial_frame_at_eof_is_desync_error() {
        let mut dst = BytesMut::new();
        ExamCodec.encode(ExamMsg::AuthSuccess, &mut dst).unwrap();

        let mut src = BytesMut::from(&dst[..FRAME_LEN / 2]);
        let err = ExamCodec.decode_eof(&mut src).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn empty_buffer_at_eof_is_clean_close() {
        let mut src = BytesMut::new();
        assert!(ExamCodec.decode_eof(&mut src).unwrap().is_none());
    }

    #[test]
    fn unknown_discriminant_is_fatal() {
        let mut bytes = BytesMut::new();
        bytes.put_u32(99);
        bytes.put_bytes(0, PAYLOAD_CAPACITY);

        let err = ExamCodec.decode(&mut bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn two_frames_decode_back_to_back() {
        let mut dst = BytesMut::new();
        ExamCodec.encode(ExamMsg::AuthRequest(b"student2".to_vec()), &mut dst).unwrap();
        ExamCodec.encode(ExamMsg::AnswerSubmission(b"b".to_vec()), &mut dst).unwrap();

        let first = ExamCodec.decode(&mut dst).unwrap().unwrap();
        let second = ExamCodec.decode(&mut dst).unwrap().unwrap();
        assert_eq!(first, ExamMsg::AuthRequest(b"student2".to_vec()));
        assert_eq!(second, ExamMsg::AnswerSubmission(b"b".to_vec()));
        assert!(dst.is_empty());
    }
}

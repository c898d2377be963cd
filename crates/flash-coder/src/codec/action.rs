//! Coders for actions and action lists.
//!
//! Actions with codes from 0x80 on carry a 16-bit body length. The body of
//! a function definition follows its record and is sized by the record's
//! code size field, not by the record length.

use crate::codec::context::Context;
use crate::codec::cursor::{Reader, Writer};
use crate::codec::registry::Factory;
use crate::codec::{Coder, cstring_size};
use crate::error::{DecodeError, EncodeError};
use crate::model::action::{Action, BasicAction, DefineFunction, PushValue};

/// Codes from this one on are followed by a body length.
const EXTENDED: u8 = 0x80;

const GOTO_FRAME: u8 = 0x81;
const GET_URL: u8 = 0x83;
const STORE_REGISTER: u8 = 0x87;
const CONSTANT_POOL: u8 = 0x88;
const WAIT_FOR_FRAME: u8 = 0x8A;
const SET_TARGET: u8 = 0x8B;
const GOTO_LABEL: u8 = 0x8C;
const WAIT_FOR_FRAME2: u8 = 0x8D;
const PUSH: u8 = 0x96;
const JUMP: u8 = 0x99;
const GET_URL2: u8 = 0x9A;
const DEFINE_FUNCTION: u8 = 0x9B;
const IF: u8 = 0x9D;
const CALL: u8 = 0x9E;
const GOTO_FRAME2: u8 = 0x9F;

/// Actions are keyed by their first byte.
pub(crate) fn action_code(reader: &Reader<'_>) -> Result<u16, DecodeError> {
    reader.scan_byte().map(u16::from)
}

pub(crate) fn register_defaults(factory: &mut Factory<Action>) {
    for basic in BasicAction::ALL {
        factory.register(*basic as u16, decode_basic);
    }
    factory.register(GOTO_FRAME as u16, decode_goto_frame);
    factory.register(GET_URL as u16, decode_get_url);
    factory.register(STORE_REGISTER as u16, decode_store_register);
    factory.register(CONSTANT_POOL as u16, decode_constant_pool);
    factory.register(WAIT_FOR_FRAME as u16, decode_wait_for_frame);
    factory.register(SET_TARGET as u16, decode_set_target);
    factory.register(GOTO_LABEL as u16, decode_goto_label);
    factory.register(WAIT_FOR_FRAME2 as u16, decode_wait_for_frame2);
    factory.register(PUSH as u16, decode_push);
    factory.register(JUMP as u16, decode_jump);
    factory.register(GET_URL2 as u16, decode_get_url2);
    factory.register(DEFINE_FUNCTION as u16, decode_define_function);
    factory.register(IF as u16, decode_if);
    factory.register(CALL as u16, decode_call);
    factory.register(GOTO_FRAME2 as u16, decode_goto_frame2);
}

/// Reads the code and length of an extended action, then decodes its body
/// and checks that exactly the declared length was consumed.
fn decode_record<T>(
    reader: &mut Reader<'_>,
    object: &'static str,
    body: impl FnOnce(&mut Reader<'_>, usize) -> Result<T, DecodeError>,
) -> Result<T, DecodeError> {
    reader.read_byte("action code")?;
    let length = reader.read_u16("action length")? as usize;
    reader.mark();
    let value = body(reader, length)?;
    reader.unmark(length, object)?;
    Ok(value)
}

fn decode_basic(reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<Action, DecodeError> {
    let code = reader.read_byte("action code")?;
    Ok(match BasicAction::from_u8(code) {
        Some(basic) => Action::Basic(basic),
        None => Action::Unknown { code, data: Vec::new() },
    })
}

fn decode_goto_frame(reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<Action, DecodeError> {
    decode_record(reader, "GotoFrame", |r, _| Ok(Action::GotoFrame(r.read_u16("frame")?)))
}

fn decode_get_url(reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<Action, DecodeError> {
    decode_record(reader, "GetUrl", |r, _| {
        let url = r.read_cstring("url")?;
        let target = r.read_cstring("target")?;
        Ok(Action::GetUrl { url, target })
    })
}

fn decode_store_register(reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<Action, DecodeError> {
    decode_record(reader, "StoreRegister", |r, _| Ok(Action::StoreRegister(r.read_byte("register")?)))
}

fn decode_constant_pool(reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<Action, DecodeError> {
    decode_record(reader, "ConstantPool", |r, _| {
        let count = r.read_u16("constant count")? as usize;
        let mut constants = Vec::with_capacity(count.min(r.remaining_len()));
        for _ in 0..count {
            constants.push(r.read_cstring("constant")?);
        }
        Ok(Action::ConstantPool(constants))
    })
}

fn decode_wait_for_frame(reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<Action, DecodeError> {
    decode_record(reader, "WaitForFrame", |r, _| {
        let frame = r.read_u16("frame")?;
        let skip_count = r.read_byte("skip count")?;
        Ok(Action::WaitForFrame { frame, skip_count })
    })
}

fn decode_set_target(reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<Action, DecodeError> {
    decode_record(reader, "SetTarget", |r, _| Ok(Action::SetTarget(r.read_cstring("target")?)))
}

fn decode_goto_label(reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<Action, DecodeError> {
    decode_record(reader, "GotoLabel", |r, _| Ok(Action::GotoLabel(r.read_cstring("label")?)))
}

fn decode_wait_for_frame2(reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<Action, DecodeError> {
    decode_record(reader, "WaitForFrame2", |r, _| {
        Ok(Action::WaitForFrame2 { skip_count: r.read_byte("skip count")? })
    })
}

fn decode_push_value(reader: &mut Reader<'_>) -> Result<PushValue, DecodeError> {
    let location = reader.location();
    let value_type = reader.read_byte("push type")?;
    Ok(match value_type {
        0 => PushValue::String(reader.read_cstring("push string")?),
        1 => PushValue::Float(reader.read_f32("push float")?),
        2 => PushValue::Null,
        3 => PushValue::Undefined,
        4 => PushValue::Register(reader.read_byte("push register")?),
        5 => PushValue::Bool(reader.read_byte("push bool")? != 0),
        6 => PushValue::Double(reader.read_double("push double")?),
        7 => PushValue::Integer(reader.read_i32("push integer")?),
        8 => PushValue::Constant8(reader.read_byte("push constant")?),
        9 => PushValue::Constant16(reader.read_u16("push constant")?),
        code => {
            return Err(DecodeError::UnsupportedVariant {
                family: "push value",
                code: code as u16,
                location,
            });
        }
    })
}

fn decode_push(reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<Action, DecodeError> {
    decode_record(reader, "Push", |r, length| {
        let mut body = r.slice(length, "push values")?;
        let mut values = Vec::new();
        while !body.is_empty() {
            values.push(decode_push_value(&mut body)?);
        }
        Ok(Action::Push(values))
    })
}

fn decode_jump(reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<Action, DecodeError> {
    decode_record(reader, "Jump", |r, _| Ok(Action::Jump(r.read_i16("branch offset")?)))
}

fn decode_get_url2(reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<Action, DecodeError> {
    decode_record(reader, "GetUrl2", |r, _| Ok(Action::GetUrl2 { flags: r.read_byte("flags")? }))
}

fn decode_define_function(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<Action, DecodeError> {
    let (name, params, code_size) = decode_record(reader, "DefineFunction", |r, _| {
        let name = r.read_cstring("function name")?;
        let count = r.read_u16("parameter count")? as usize;
        let mut params = Vec::with_capacity(count.min(r.remaining_len()));
        for _ in 0..count {
            params.push(r.read_cstring("parameter")?);
        }
        let code_size = r.read_u16("code size")? as usize;
        Ok((name, params, code_size))
    })?;
    let mut block = reader.slice(code_size, "function body")?;
    let body = ctx.scope(|ctx| {
        ctx.enter_nested("function nesting")?;
        decode_action_block(&mut block, ctx)
    })?;
    Ok(Action::DefineFunction(DefineFunction { name, params, body }))
}

fn decode_if(reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<Action, DecodeError> {
    decode_record(reader, "If", |r, _| Ok(Action::If(r.read_i16("branch offset")?)))
}

fn decode_call(reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<Action, DecodeError> {
    decode_record(reader, "Call", |_, _| Ok(Action::Call))
}

fn decode_goto_frame2(reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<Action, DecodeError> {
    decode_record(reader, "GotoFrame2", |r, _| {
        let flags = r.read_byte("flags")?;
        let scene_bias = if flags & 0x02 != 0 { Some(r.read_u16("scene bias")?) } else { None };
        Ok(Action::GotoFrame2 { play: flags & 0x01 != 0, scene_bias })
    })
}

/// Preserves an action without a registered decoder.
pub(crate) fn decode_unknown(reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<Action, DecodeError> {
    let code = reader.read_byte("action code")?;
    let data = if code >= EXTENDED {
        let length = reader.read_u16("action length")? as usize;
        reader.read_bytes(length, "action body")?.to_vec()
    } else {
        Vec::new()
    };
    Ok(Action::Unknown { code, data })
}

// =============================================================================
// ACTION LISTS
// =============================================================================

/// Decodes actions up to and including the terminating End action.
pub(crate) fn decode_actions(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<Vec<Action>, DecodeError> {
    let mut actions = Vec::new();
    while reader.scan_byte()? != Action::END {
        actions.push(Action::decode(reader, ctx)?);
    }
    reader.read_byte("end action")?;
    Ok(actions)
}

pub(crate) fn actions_size(actions: &[Action], ctx: &mut Context<'_>) -> Result<usize, EncodeError> {
    Ok(block_size(actions, ctx)? + 1)
}

pub(crate) fn encode_actions(
    actions: &[Action],
    writer: &mut Writer<'_>,
    ctx: &mut Context<'_>,
) -> Result<(), EncodeError> {
    encode_block(actions, writer, ctx)?;
    writer.write_byte(Action::END)
}

/// Decodes actions until the reader is exhausted, without terminator.
fn decode_action_block(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<Vec<Action>, DecodeError> {
    let mut actions = Vec::new();
    while !reader.is_empty() {
        actions.push(Action::decode(reader, ctx)?);
    }
    Ok(actions)
}

fn block_size(actions: &[Action], ctx: &mut Context<'_>) -> Result<usize, EncodeError> {
    let mut size = 0;
    for action in actions {
        size += action.prepare_to_encode(ctx)?;
    }
    Ok(size)
}

fn encode_block(actions: &[Action], writer: &mut Writer<'_>, ctx: &mut Context<'_>) -> Result<(), EncodeError> {
    for action in actions {
        action.encode(writer, ctx)?;
    }
    Ok(())
}

// =============================================================================
// ENCODING
// =============================================================================

fn checked_u16(field: &'static str, len: usize) -> Result<u16, EncodeError> {
    u16::try_from(len).map_err(|_| EncodeError::LengthExceedsLimit {
        field,
        len,
        max: u16::MAX as usize,
    })
}

impl PushValue {
    fn encoded_size(&self, ctx: &Context<'_>) -> usize {
        1 + match self {
            PushValue::String(text) => cstring_size(text, ctx),
            PushValue::Float(_) | PushValue::Integer(_) => 4,
            PushValue::Null | PushValue::Undefined => 0,
            PushValue::Register(_) | PushValue::Bool(_) | PushValue::Constant8(_) => 1,
            PushValue::Double(_) => 8,
            PushValue::Constant16(_) => 2,
        }
    }

    fn encode(&self, writer: &mut Writer<'_>) -> Result<(), EncodeError> {
        writer.write_byte(self.value_type())?;
        match self {
            PushValue::String(text) => writer.write_cstring(text, "push string"),
            PushValue::Float(value) => writer.write_f32(*value),
            PushValue::Null | PushValue::Undefined => Ok(()),
            PushValue::Register(register) => writer.write_byte(*register),
            PushValue::Bool(flag) => writer.write_byte(u8::from(*flag)),
            PushValue::Double(value) => writer.write_double(*value),
            PushValue::Integer(value) => writer.write_i32(*value),
            PushValue::Constant8(index) => writer.write_byte(*index),
            PushValue::Constant16(index) => writer.write_u16(*index),
        }
    }
}

impl Action {
    /// Returns the size of the record body, excluding code and length.
    fn body_len(&self, ctx: &Context<'_>) -> usize {
        match self {
            Action::Basic(_) | Action::Call => 0,
            Action::GotoFrame(_) | Action::Jump(_) | Action::If(_) => 2,
            Action::GetUrl { url, target } => cstring_size(url, ctx) + cstring_size(target, ctx),
            Action::StoreRegister(_) | Action::WaitForFrame2 { .. } | Action::GetUrl2 { .. } => 1,
            Action::ConstantPool(constants) => {
                2 + constants.iter().map(|c| cstring_size(c, ctx)).sum::<usize>()
            }
            Action::WaitForFrame { .. } => 3,
            Action::SetTarget(text) | Action::GotoLabel(text) => cstring_size(text, ctx),
            Action::Push(values) => values.iter().map(|v| v.encoded_size(ctx)).sum(),
            Action::DefineFunction(function) => {
                cstring_size(&function.name, ctx)
                    + 2
                    + function.params.iter().map(|p| cstring_size(p, ctx)).sum::<usize>()
                    + 2
            }
            Action::GotoFrame2 { scene_bias, .. } => 1 + if scene_bias.is_some() { 2 } else { 0 },
            Action::Unknown { data, .. } => data.len(),
        }
    }
}

impl Coder for Action {
    fn decode(reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<Self, DecodeError> {
        let registry = ctx.registry()?;
        registry.actions.get_object(reader, ctx)
    }

    fn prepare_to_encode(&self, ctx: &mut Context<'_>) -> Result<usize, EncodeError> {
        if self.code() < EXTENDED {
            return Ok(1);
        }
        let mut size = 3 + self.body_len(ctx);
        if let Action::DefineFunction(function) = self {
            size += block_size(&function.body, ctx)?;
        }
        Ok(size)
    }

    fn encode(&self, writer: &mut Writer<'_>, ctx: &mut Context<'_>) -> Result<(), EncodeError> {
        let code = self.code();
        if code < EXTENDED {
            if let Action::Unknown { data, .. } = self {
                if !data.is_empty() {
                    return Err(EncodeError::InvalidValue {
                        field: "action",
                        reason: "codes below 0x80 cannot carry a body",
                    });
                }
            }
            return writer.write_byte(code);
        }

        let length = self.body_len(ctx);
        writer.write_byte(code)?;
        writer.write_u16(checked_u16("action body", length)?)?;
        writer.mark();
        match self {
            Action::GotoFrame(frame) => writer.write_u16(*frame)?,
            Action::GetUrl { url, target } => {
                writer.write_cstring(url, "url")?;
                writer.write_cstring(target, "target")?;
            }
            Action::StoreRegister(register) => writer.write_byte(*register)?,
            Action::ConstantPool(constants) => {
                writer.write_u16(checked_u16("constant pool", constants.len())?)?;
                for constant in constants {
                    writer.write_cstring(constant, "constant")?;
                }
            }
            Action::WaitForFrame { frame, skip_count } => {
                writer.write_u16(*frame)?;
                writer.write_byte(*skip_count)?;
            }
            Action::SetTarget(target) => writer.write_cstring(target, "target")?,
            Action::GotoLabel(label) => writer.write_cstring(label, "label")?,
            Action::WaitForFrame2 { skip_count } => writer.write_byte(*skip_count)?,
            Action::Push(values) => {
                for value in values {
                    value.encode(writer)?;
                }
            }
            Action::Jump(offset) | Action::If(offset) => writer.write_i16(*offset)?,
            Action::GetUrl2 { flags } => writer.write_byte(*flags)?,
            Action::DefineFunction(function) => {
                writer.write_cstring(&function.name, "function name")?;
                writer.write_u16(checked_u16("parameters", function.params.len())?)?;
                for param in &function.params {
                    writer.write_cstring(param, "parameter")?;
                }
                writer.write_u16(checked_u16("function body", block_size(&function.body, ctx)?)?)?;
            }
            Action::Call => {}
            Action::GotoFrame2 { play, scene_bias } => {
                writer.write_byte(u8::from(scene_bias.is_some()) << 1 | u8::from(*play))?;
                if let Some(bias) = scene_bias {
                    writer.write_u16(*bias)?;
                }
            }
            Action::Unknown { data, .. } => writer.write_bytes(data)?,
            Action::Basic(_) => {}
        }
        writer.unmark(length, "action")?;

        if let Action::DefineFunction(function) = self {
            encode_block(&function.body, writer, ctx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::registry::DecoderRegistry;
    use crate::codec::test_support::roundtrip;
    use crate::limits::MAX_NESTING_DEPTH;

    fn decode_list(bytes: &[u8]) -> Result<Vec<Action>, DecodeError> {
        let registry = DecoderRegistry::new();
        let mut ctx = Context::with_registry(&registry);
        decode_actions(&mut Reader::new(bytes), &mut ctx)
    }

    fn encode_list(actions: &[Action]) -> Vec<u8> {
        let mut ctx = Context::new();
        let size = actions_size(actions, &mut ctx).unwrap();
        let mut writer = Writer::new();
        encode_actions(actions, &mut writer, &mut ctx).unwrap();
        assert_eq!(writer.len(), size);
        writer.into_bytes()
    }

    #[test]
    fn test_every_basic_action() {
        let actions: Vec<Action> = BasicAction::ALL.iter().map(|b| Action::Basic(*b)).collect();
        let bytes = encode_list(&actions);
        assert_eq!(bytes.len(), BasicAction::ALL.len() + 1);
        assert_eq!(decode_list(&bytes).unwrap(), actions);
    }

    #[test]
    fn test_extended_actions_roundtrip() {
        let actions = vec![
            Action::ConstantPool(vec!["x".to_string(), "trace".to_string()]),
            Action::GotoFrame(12),
            Action::GetUrl { url: "http://example.com".to_string(), target: "_blank".to_string() },
            Action::StoreRegister(3),
            Action::WaitForFrame { frame: 4, skip_count: 2 },
            Action::SetTarget("/clip".to_string()),
            Action::GotoLabel("intro".to_string()),
            Action::WaitForFrame2 { skip_count: 1 },
            Action::Push(vec![
                PushValue::String("hello".to_string()),
                PushValue::Float(1.5),
                PushValue::Null,
                PushValue::Undefined,
                PushValue::Register(1),
                PushValue::Bool(true),
                PushValue::Double(-2.25),
                PushValue::Integer(-70000),
                PushValue::Constant8(1),
                PushValue::Constant16(1),
            ]),
            Action::Jump(-5),
            Action::If(10),
            Action::GetUrl2 { flags: 0x41 },
            Action::Call,
            Action::GotoFrame2 { play: true, scene_bias: Some(7) },
            Action::GotoFrame2 { play: false, scene_bias: None },
        ];
        let bytes = encode_list(&actions);
        assert_eq!(decode_list(&bytes).unwrap(), actions);
    }

    #[test]
    fn test_define_function_body_follows_record() {
        let function = Action::DefineFunction(DefineFunction {
            name: "f".to_string(),
            params: vec!["a".to_string()],
            body: vec![
                Action::Push(vec![PushValue::String("a".to_string())]),
                Action::Basic(BasicAction::GetVariable),
                Action::Basic(BasicAction::Return),
            ],
        });
        let bytes = roundtrip(&function, |_| {});
        // Record: code, length 8, "f\0", 1 param, "a\0", code size 8.
        assert_eq!(&bytes[..3], &[0x9B, 8, 0]);
        assert_eq!(&bytes[9..11], &[8, 0]);
        assert_eq!(bytes.len(), 11 + 8);
    }

    /// Builds `levels` function definitions, each holding the next one as
    /// its only action, followed by the End action.
    fn nested_functions(levels: usize) -> Vec<u8> {
        let mut body = Vec::new();
        for _ in 0..levels {
            let mut record = vec![DEFINE_FUNCTION, 5, 0, 0, 0, 0];
            record.extend_from_slice(&(body.len() as u16).to_le_bytes());
            record.extend_from_slice(&body);
            body = record;
        }
        body.push(Action::END);
        body
    }

    #[test]
    fn test_function_nesting_limit() {
        let actions = decode_list(&nested_functions(MAX_NESTING_DEPTH)).unwrap();
        assert_eq!(actions.len(), 1);

        let err = decode_list(&nested_functions(MAX_NESTING_DEPTH + 1)).unwrap_err();
        assert!(matches!(err, DecodeError::LengthExceedsLimit { field: "function nesting", .. }));

        // Deep enough to exhaust the stack without a limit.
        let err = decode_list(&nested_functions(8191)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::MalformedEncoding);
    }

    #[test]
    fn test_unknown_actions_preserved() {
        let bytes = [0x7F, 0xA5, 0x02, 0x00, 0xAB, 0xCD, 0x07, 0x00];
        let actions = decode_list(&bytes).unwrap();
        assert_eq!(
            actions,
            vec![
                Action::Unknown { code: 0x7F, data: vec![] },
                Action::Unknown { code: 0xA5, data: vec![0xAB, 0xCD] },
                Action::Basic(BasicAction::Stop),
            ]
        );
        assert_eq!(encode_list(&actions), bytes);
    }

    #[test]
    fn test_declared_length_mismatch() {
        // GotoFrame declaring 3 body bytes but holding a 2-byte frame.
        let bytes = [0x81, 0x03, 0x00, 0x01, 0x00, 0x00, 0x00];
        let err = decode_list(&bytes).unwrap_err();
        assert!(matches!(err, DecodeError::Underflow { object: "GotoFrame", delta: -8, .. }));
    }

    #[test]
    fn test_missing_end_action() {
        let err = decode_list(&[0x07]).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedEof { .. }));
    }

    #[test]
    fn test_unsupported_push_type() {
        let bytes = [0x96, 0x01, 0x00, 0x0A, 0x00];
        let err = decode_list(&bytes).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedVariant { family: "push value", code: 10, .. }));
    }
}

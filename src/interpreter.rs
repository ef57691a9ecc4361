//! The execution loop and opcode dispatch table. Exposes two execution
//! modes: `run()` (classic, run-to-completion against a synchronous
//! `IoProvider`) and the pump API (`run_until_input`/`submit_line_input`/
//! `submit_char_input`), which is the primary, recommended mode — it lets a
//! caller drive the engine one input request at a time without the engine
//! ever blocking on I/O itself.

use crate::dictionary;
use crate::error::{ZError, ZResult};
use crate::instruction::{Instruction, InstructionForm, OperandCount, OperandType};
use crate::io::{Cursor, InputStream, IoCommand, IoProvider, IoReply, TextStyle};
use crate::object;
use crate::quetzal::restore::RestoredSave;
use crate::quetzal::save::build_save_file;
use crate::streams::OutputStreams;
use crate::vm::Engine;
use crate::zrand::ZRand;
use crate::zstring;

const RUNAWAY_INSTRUCTION_LIMIT: u64 = 10_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    Continue,
    Branched,
    Called,
    Returned,
    Quit,
    GameOver,
}

/// What the engine was doing when it suspended for input, so
/// `submit_line_input`/`submit_char_input` know how to resume.
enum PendingInput {
    Line { text_buffer: u32, parse_buffer: u32, store_var: Option<u8> },
    Char { store_var: Option<u8> },
}

/// The public face of `PendingInput`: which `submit_*` call a pump-mode
/// caller should make after `run_until_input` returns `Continue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingInputKind {
    Line,
    Char,
}

pub struct Interpreter {
    pub engine: Engine,
    pub streams: OutputStreams,
    pub rand: ZRand,
    original_dynamic: Vec<u8>,
    instruction_count: u64,
    pending_input: Option<PendingInput>,
}

impl Interpreter {
    pub fn new(engine: Engine) -> Interpreter {
        let original_dynamic = engine.memory.dynamic_slice().to_vec();
        Interpreter {
            engine,
            streams: OutputStreams::new(),
            rand: ZRand::new_uniform(),
            original_dynamic,
            instruction_count: 0,
            pending_input: None,
        }
    }

    /// What kind of input `run_until_input` is waiting on, if any.
    pub fn pending_input_kind(&self) -> Option<PendingInputKind> {
        match self.pending_input {
            Some(PendingInput::Line { .. }) => Some(PendingInputKind::Line),
            Some(PendingInput::Char { .. }) => Some(PendingInputKind::Char),
            None => None,
        }
    }

    // ---- Classic mode: run to completion or error ----

    pub fn run(&mut self, io: &mut dyn IoProvider) -> ZResult<()> {
        loop {
            match self.run_until_input(io)? {
                ExecutionResult::Quit | ExecutionResult::GameOver => return Ok(()),
                ExecutionResult::Continue => self.resolve_pending_input_synchronously(io)?,
                _ => unreachable!("run_until_input only returns Continue/Quit/GameOver"),
            }
        }
    }

    /// Services whatever input request is currently suspended by calling the
    /// provider directly and feeding the answer straight back in — the
    /// synchronous half of classic mode. Pump-mode callers do this themselves,
    /// on their own schedule, via `submit_line_input`/`submit_char_input`.
    fn resolve_pending_input_synchronously(&mut self, io: &mut dyn IoProvider) -> ZResult<()> {
        match self.pending_input {
            Some(PendingInput::Line { text_buffer, .. }) => {
                let max_len = self.engine.memory.read_byte(text_buffer)?;
                let reply = io.dispatch(IoCommand::ReadLine {
                    max_len,
                    existing: String::new(),
                    time_tenths: 0,
                })?;
                if let IoReply::Line { text, .. } = reply {
                    self.submit_line_input(&text)?;
                }
                Ok(())
            }
            Some(PendingInput::Char { .. }) => {
                if let IoReply::Char(ch) = io.dispatch(IoCommand::ReadChar { time_tenths: 0 })? {
                    self.submit_char_input(ch)?;
                }
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Decodes and executes exactly one instruction.
    fn step(&mut self, io: &mut dyn IoProvider) -> ZResult<ExecutionResult> {
        if self.instruction_count >= RUNAWAY_INSTRUCTION_LIMIT {
            return Err(ZError::illegal(self.engine.pc, "runaway execution: instruction limit exceeded"));
        }
        let pc = self.engine.pc;
        let inst = Instruction::decode(&self.engine.memory, &self.engine.header, pc)?;
        self.engine.pc = pc + inst.size as u32;
        self.instruction_count += 1;
        self.execute(&inst, io)
    }

    // ---- Pump mode: the primary execution mode ----

    /// Runs until the engine needs line or character input, or terminates.
    /// Returns `ExecutionResult::Quit`/`GameOver` on termination, or
    /// `Continue` to signal "suspended awaiting input" (the caller should
    /// call `submit_line_input`/`submit_char_input` next).
    pub fn run_until_input(&mut self, io: &mut dyn IoProvider) -> ZResult<ExecutionResult> {
        loop {
            if self.pending_input.is_some() {
                return Ok(ExecutionResult::Continue);
            }
            match self.step(io)? {
                ExecutionResult::Quit => return Ok(ExecutionResult::Quit),
                ExecutionResult::GameOver => return Ok(ExecutionResult::GameOver),
                _ => continue,
            }
        }
    }

    /// Feeds a line of input back in response to a suspended `sread`/`aread`.
    /// Only valid to call after `run_until_input` returns `Continue` with a
    /// pending line request; otherwise an error.
    pub fn submit_line_input(&mut self, line: &str) -> ZResult<()> {
        let pending = self
            .pending_input
            .take()
            .ok_or_else(|| ZError::illegal(self.engine.pc, "no pending line input request"))?;
        match pending {
            PendingInput::Line { text_buffer, parse_buffer, store_var } => {
                self.finish_line_input(text_buffer, parse_buffer, store_var, line)
            }
            PendingInput::Char { .. } => {
                Err(ZError::illegal(self.engine.pc, "pending request was char input, not line input"))
            }
        }
    }

    /// Feeds a single character back in response to a suspended `read_char`.
    pub fn submit_char_input(&mut self, ch: u8) -> ZResult<()> {
        let pending = self
            .pending_input
            .take()
            .ok_or_else(|| ZError::illegal(self.engine.pc, "no pending char input request"))?;
        match pending {
            PendingInput::Char { store_var } => {
                if let Some(v) = store_var {
                    self.engine.write_variable(v, ch as u16)?;
                }
                Ok(())
            }
            PendingInput::Line { .. } => {
                Err(ZError::illegal(self.engine.pc, "pending request was line input, not char input"))
            }
        }
    }

    fn finish_line_input(
        &mut self,
        text_buffer: u32,
        parse_buffer: u32,
        store_var: Option<u8>,
        line: &str,
    ) -> ZResult<()> {
        let max_len = self.engine.memory.read_byte(text_buffer)? as usize;
        let truncated: String = line.chars().take(max_len).collect();
        self.streams.most_recent_input_line = truncated.clone();

        let version = self.engine.header.version;
        let text_start = if version <= 4 { text_buffer + 1 } else { text_buffer + 2 };
        for (i, ch) in truncated.bytes().enumerate() {
            self.engine.memory.write_byte(text_start + i as u32, ch.to_ascii_lowercase())?;
        }
        if version <= 4 {
            self.engine.memory.write_byte(text_start + truncated.len() as u32, 0)?;
        } else {
            self.engine.memory.write_byte(text_buffer + 1, truncated.len() as u8)?;
        }

        if parse_buffer != 0 {
            let dict_addr = self.engine.header.dictionary_addr as u32;
            let sep = dictionary::read_dictionary_header(&self.engine.memory, dict_addr)?.separators;
            let tokens = dictionary::tokenise_text(&truncated, &sep);
            dictionary::write_parse_buffer(
                &mut self.engine.memory,
                &self.engine.header,
                dict_addr,
                parse_buffer,
                &tokens,
                true,
            )?;
        }
        if let Some(v) = store_var {
            // V5+ `aread` stores the terminating character (always newline here).
            self.engine.write_variable(v, 13)?;
        }
        Ok(())
    }

    // ---- Operand resolution ----

    fn resolve_operands(&mut self, inst: &Instruction) -> ZResult<Vec<u16>> {
        let mut values = Vec::with_capacity(inst.operands.len());
        for (i, &raw) in inst.operands.iter().enumerate() {
            let t = inst.operand_types[i];
            let v = match t {
                OperandType::Variable => {
                    let var_num = raw as u8;
                    if var_num == 0 {
                        self.engine.pop()?
                    } else {
                        self.engine.read_variable(var_num)?
                    }
                }
                _ => raw,
            };
            values.push(v);
        }
        Ok(values)
    }

    fn do_branch(&mut self, inst: &Instruction, condition: bool) -> ZResult<ExecutionResult> {
        let branch = inst.branch.as_ref().expect("do_branch called without branch info");
        if condition != branch.on_true {
            return Ok(ExecutionResult::Continue);
        }
        match branch.offset {
            0 => {
                self.engine.do_return(0)?;
                Ok(ExecutionResult::Returned)
            }
            1 => {
                self.engine.do_return(1)?;
                Ok(ExecutionResult::Returned)
            }
            offset => {
                self.engine.pc = (self.engine.pc as i32 + offset as i32 - 2) as u32;
                Ok(ExecutionResult::Branched)
            }
        }
    }

    fn print_text(&mut self, text: &str, io: &mut dyn IoProvider) -> ZResult<()> {
        let engine_memory = &mut self.engine.memory;
        let mut print_to_provider = |s: &str| -> ZResult<()> {
            io.dispatch(IoCommand::Print { text: s.to_string() }).map(|_| ())
        };
        self.streams.write_text(engine_memory, text, &mut print_to_provider)
    }

    // ---- Dispatch ----

    fn execute(&mut self, inst: &Instruction, io: &mut dyn IoProvider) -> ZResult<ExecutionResult> {
        let operands = self.resolve_operands(inst)?;
        match inst.form {
            InstructionForm::Extended => self.execute_ext(inst, &operands, io),
            InstructionForm::Short => match inst.operand_count {
                OperandCount::OP0 => self.execute_0op(inst, io),
                OperandCount::OP1 => self.execute_1op(inst, operands[0], io),
                _ => Err(ZError::illegal(inst.addr, "short form with unexpected operand count")),
            },
            InstructionForm::Long => self.execute_2op(inst, operands[0], operands[1], io),
            InstructionForm::Variable => match inst.operand_count {
                OperandCount::OP2 => self.execute_2op(inst, operands[0], operands[1], io),
                _ => self.execute_var(inst, &operands, io),
            },
        }
    }

    fn store(&mut self, inst: &Instruction, value: u16) -> ZResult<()> {
        if let Some(v) = inst.store_var {
            self.engine.write_variable(v, value)?;
        }
        Ok(())
    }

    fn do_call(
        &mut self,
        routine_packed: u16,
        args: &[u16],
        store_var: Option<u8>,
    ) -> ZResult<ExecutionResult> {
        if routine_packed == 0 {
            // Calling address 0 is documented to return false without a call.
            if let Some(v) = store_var {
                self.engine.write_variable(v, 0)?;
            }
            return Ok(ExecutionResult::Continue);
        }
        let addr = self.engine.header.unpack_routine_address(routine_packed);
        self.engine.call_routine(addr, args, store_var)?;
        Ok(ExecutionResult::Called)
    }

    fn execute_0op(&mut self, inst: &Instruction, io: &mut dyn IoProvider) -> ZResult<ExecutionResult> {
        match inst.opcode {
            0x00 => {
                self.engine.do_return(1)?;
                Ok(ExecutionResult::Returned)
            }
            0x01 => {
                self.engine.do_return(0)?;
                Ok(ExecutionResult::Returned)
            }
            0x02 => {
                if let Some(text) = &inst.text {
                    self.print_text(&text.clone(), io)?;
                }
                Ok(ExecutionResult::Continue)
            }
            0x03 => {
                if let Some(text) = &inst.text {
                    self.print_text(&text.clone(), io)?;
                    self.print_text("\n", io)?;
                }
                self.engine.do_return(1)?;
                Ok(ExecutionResult::Returned)
            }
            0x04 => Ok(ExecutionResult::Continue),
            0x05 => self.op_save(inst, io),
            0x06 => self.op_restore(inst, io),
            0x07 => Err(ZError::illegal(inst.addr, "restart is handled by the host, not mid-instruction")),
            0x08 => {
                let v = self.engine.pop()?;
                self.engine.do_return(v)?;
                Ok(ExecutionResult::Returned)
            }
            0x09 => {
                if self.engine.header.version <= 4 {
                    self.engine.pop()?;
                    Ok(ExecutionResult::Continue)
                } else {
                    self.store(inst, self.engine.call_depth() as u16)?;
                    Ok(ExecutionResult::Continue)
                }
            }
            0x0A => Ok(ExecutionResult::Quit),
            0x0B => {
                self.print_text("\n", io)?;
                Ok(ExecutionResult::Continue)
            }
            0x0C => self.op_show_status(io),
            0x0D => {
                let declared = self.engine.header.declared_file_length();
                let ok = self.engine.memory.checksum(declared) == self.engine.header.checksum;
                self.do_branch(inst, ok)
            }
            0x0F => {
                // piracy: interpreters are instructed to be "gullible" and
                // always report the story as genuine.
                self.do_branch(inst, true)
            }
            other => Err(ZError::UnsupportedOpcode { pc: inst.addr, opcode: other, form: "0OP" }),
        }
    }

    fn op_show_status(&mut self, io: &mut dyn IoProvider) -> ZResult<ExecutionResult> {
        if self.engine.header.version != 3 {
            // Deliberate deviation from strict illegality for V4+: treated as
            // a documented no-op rather than an error (see DESIGN.md).
            return Ok(ExecutionResult::Continue);
        }
        let location_obj = self.engine.read_global(0x10)?;
        let location = if location_obj != 0 {
            let addr = object::object_short_name_addr(&self.engine.memory, &self.engine.header, location_obj)?;
            zstring::decode_string(&self.engine.memory, &self.engine.header, addr)?.0
        } else {
            String::new()
        };
        let score = self.engine.read_global(0x11)? as i16;
        let moves = self.engine.read_global(0x12)?;
        io.dispatch(IoCommand::Status { location, score, moves, time_format: false })?;
        Ok(ExecutionResult::Continue)
    }

    fn op_save(&mut self, inst: &Instruction, io: &mut dyn IoProvider) -> ZResult<ExecutionResult> {
        let data = build_save_file(&self.engine, &self.original_dynamic);
        let reply = io.dispatch(IoCommand::Save { data })?;
        let ok = matches!(reply, IoReply::SaveResult(true));
        if self.engine.header.version <= 3 {
            self.do_branch(inst, ok)
        } else {
            self.store(inst, if ok { 1 } else { 0 })?;
            Ok(ExecutionResult::Continue)
        }
    }

    fn op_restore(&mut self, inst: &Instruction, io: &mut dyn IoProvider) -> ZResult<ExecutionResult> {
        let reply = io.dispatch(IoCommand::Restore)?;
        let data = match reply {
            IoReply::RestoreResult(Some(d)) => d,
            _ => {
                if self.engine.header.version <= 3 {
                    return self.do_branch(inst, false);
                } else {
                    self.store(inst, 0)?;
                    return Ok(ExecutionResult::Continue);
                }
            }
        };
        let save = RestoredSave::parse(&data)?;
        save.restore_into(&mut self.engine, &self.original_dynamic)?;
        if self.engine.header.version <= 3 {
            self.do_branch(inst, true)
        } else {
            self.store(inst, 2)?;
            Ok(ExecutionResult::Continue)
        }
    }

    fn execute_1op(&mut self, inst: &Instruction, operand: u16, io: &mut dyn IoProvider) -> ZResult<ExecutionResult> {
        match inst.opcode {
            0x00 => self.do_branch(inst, operand == 0),
            0x01 => {
                let sibling = object::get_sibling(&self.engine.memory, &self.engine.header, operand)?;
                self.store(inst, sibling)?;
                self.do_branch(inst, sibling != 0)
            }
            0x02 => {
                let child = object::get_child(&self.engine.memory, &self.engine.header, operand)?;
                self.store(inst, child)?;
                self.do_branch(inst, child != 0)
            }
            0x03 => {
                let parent = object::get_parent(&self.engine.memory, &self.engine.header, operand)?;
                self.store(inst, parent)?;
                Ok(ExecutionResult::Continue)
            }
            0x04 => {
                let len = object::get_property_length(&self.engine.memory, &self.engine.header, operand)?;
                self.store(inst, len as u16)?;
                Ok(ExecutionResult::Continue)
            }
            0x05 => {
                let var_num = inst.operands[0] as u8;
                let v = self.engine.read_variable(var_num)?;
                self.engine.write_variable(var_num, v.wrapping_add(1))?;
                Ok(ExecutionResult::Continue)
            }
            0x06 => {
                let var_num = inst.operands[0] as u8;
                let v = self.engine.read_variable(var_num)?;
                self.engine.write_variable(var_num, v.wrapping_sub(1))?;
                Ok(ExecutionResult::Continue)
            }
            0x07 => {
                let text = zstring::decode_string(&self.engine.memory, &self.engine.header, operand as u32)?.0;
                self.print_text(&text, io)?;
                Ok(ExecutionResult::Continue)
            }
            0x08 => {
                let store_var = inst.store_var;
                self.do_call(operand, &[], store_var)
            }
            0x09 => {
                object::remove_from_tree(&mut self.engine.memory, &self.engine.header, operand)?;
                Ok(ExecutionResult::Continue)
            }
            0x0A => {
                let addr = object::object_short_name_addr(&self.engine.memory, &self.engine.header, operand)?;
                let text = zstring::decode_string(&self.engine.memory, &self.engine.header, addr)?.0;
                self.print_text(&text, io)?;
                Ok(ExecutionResult::Continue)
            }
            0x0B => {
                self.engine.do_return(operand)?;
                Ok(ExecutionResult::Returned)
            }
            0x0C => {
                let offset = operand as i16;
                self.engine.pc = (self.engine.pc as i32 + offset as i32 - 2) as u32;
                Ok(ExecutionResult::Branched)
            }
            0x0D => {
                let text = zstring::decode_string_at_packed(&self.engine.memory, &self.engine.header, operand)?;
                self.print_text(&text, io)?;
                Ok(ExecutionResult::Continue)
            }
            0x0E => {
                if inst.operand_types[0] != OperandType::Variable {
                    return Err(ZError::illegal(inst.addr, "load requires a variable operand"));
                }
                let var_num = inst.operands[0] as u8;
                let value = self.engine.read_variable(var_num)?;
                self.store(inst, value)?;
                Ok(ExecutionResult::Continue)
            }
            0x0F => {
                if self.engine.header.version <= 4 {
                    self.store(inst, !operand)?;
                    Ok(ExecutionResult::Continue)
                } else {
                    self.do_call(operand, &[], None)
                }
            }
            other => Err(ZError::UnsupportedOpcode { pc: inst.addr, opcode: other, form: "1OP" }),
        }
    }

    fn execute_2op(&mut self, inst: &Instruction, a: u16, b: u16, io: &mut dyn IoProvider) -> ZResult<ExecutionResult> {
        let header = &self.engine.header;
        match inst.opcode {
            0x01 => self.do_branch(inst, a as i16 == b as i16),
            0x02 => self.do_branch(inst, (a as i16) < (b as i16)),
            0x03 => self.do_branch(inst, (a as i16) > (b as i16)),
            0x04 => {
                let var_num = a as u8;
                let v = (self.engine.read_variable(var_num)? as i16).wrapping_sub(1);
                self.engine.write_variable(var_num, v as u16)?;
                self.do_branch(inst, v < b as i16)
            }
            0x05 => {
                let var_num = a as u8;
                let v = (self.engine.read_variable(var_num)? as i16).wrapping_add(1);
                self.engine.write_variable(var_num, v as u16)?;
                self.do_branch(inst, v > b as i16)
            }
            0x06 => {
                let parent = object::get_parent(&self.engine.memory, header, a)?;
                self.do_branch(inst, parent == b)
            }
            0x07 => self.do_branch(inst, (a & b) == b),
            0x08 => {
                self.store(inst, a | b)?;
                Ok(ExecutionResult::Continue)
            }
            0x09 => {
                self.store(inst, a & b)?;
                Ok(ExecutionResult::Continue)
            }
            0x0A => {
                let result = object::test_attribute(&self.engine.memory, header, a, b)?;
                self.do_branch(inst, result)
            }
            0x0B => {
                object::set_attribute(&mut self.engine.memory, header, a, b, true)?;
                Ok(ExecutionResult::Continue)
            }
            0x0C => {
                object::set_attribute(&mut self.engine.memory, header, a, b, false)?;
                Ok(ExecutionResult::Continue)
            }
            0x0D => {
                self.engine.write_variable(a as u8, b)?;
                Ok(ExecutionResult::Continue)
            }
            0x0E => {
                object::insert_into_tree(&mut self.engine.memory, header, a, b)?;
                Ok(ExecutionResult::Continue)
            }
            0x0F => {
                let addr = a as u32 + 2 * b as u32;
                let v = self.engine.memory.read_word(addr)?;
                self.store(inst, v)?;
                Ok(ExecutionResult::Continue)
            }
            0x10 => {
                let addr = a as u32 + b as u32;
                let v = self.engine.memory.read_byte(addr)? as u16;
                self.store(inst, v)?;
                Ok(ExecutionResult::Continue)
            }
            0x11 => {
                let v = object::get_property(&self.engine.memory, header, a, b as u8)?;
                self.store(inst, v)?;
                Ok(ExecutionResult::Continue)
            }
            0x12 => {
                let v = object::get_property_addr(&self.engine.memory, header, a, b as u8)?;
                self.store(inst, v)?;
                Ok(ExecutionResult::Continue)
            }
            0x13 => {
                let v = object::get_next_property(&self.engine.memory, header, a, b as u8)?;
                self.store(inst, v as u16)?;
                Ok(ExecutionResult::Continue)
            }
            0x14 => {
                self.store(inst, (a as i16).wrapping_add(b as i16) as u16)?;
                Ok(ExecutionResult::Continue)
            }
            0x15 => {
                self.store(inst, (a as i16).wrapping_sub(b as i16) as u16)?;
                Ok(ExecutionResult::Continue)
            }
            0x16 => {
                self.store(inst, (a as i16).wrapping_mul(b as i16) as u16)?;
                Ok(ExecutionResult::Continue)
            }
            0x17 => {
                let (a, b) = (a as i16, b as i16);
                if b == 0 {
                    return Err(ZError::illegal(inst.addr, "division by zero"));
                }
                // MIN_INT / -1 would overflow i16; Standard is silent, we
                // saturate rather than panic (see DESIGN.md Open Questions).
                let result = if a == i16::MIN && b == -1 { i16::MIN } else { a / b };
                self.store(inst, result as u16)?;
                Ok(ExecutionResult::Continue)
            }
            0x18 => {
                let (a, b) = (a as i16, b as i16);
                if b == 0 {
                    return Err(ZError::illegal(inst.addr, "modulo by zero"));
                }
                let result = if a == i16::MIN && b == -1 { 0 } else { a % b };
                self.store(inst, result as u16)?;
                Ok(ExecutionResult::Continue)
            }
            0x19 => {
                let store_var = inst.store_var;
                self.do_call(a, &[b], store_var)
            }
            0x1A => self.do_call(a, &[b], None),
            0x1B => {
                io.dispatch(IoCommand::SetColour { foreground: a, background: b })?;
                Ok(ExecutionResult::Continue)
            }
            0x1C => Err(ZError::UnsupportedOpcode { pc: inst.addr, opcode: 0x1C, form: "2OP" }), // throw
            other => Err(ZError::UnsupportedOpcode { pc: inst.addr, opcode: other, form: "2OP" }),
        }
    }

    fn execute_var(&mut self, inst: &Instruction, ops: &[u16], io: &mut dyn IoProvider) -> ZResult<ExecutionResult> {
        match inst.opcode {
            0x00 => {
                let store_var = inst.store_var;
                self.do_call(ops[0], &ops[1..], store_var)
            }
            0x01 => {
                let addr = ops[0] as u32 + 2 * ops[1] as u32;
                self.engine.memory.write_word(addr, ops[2])?;
                Ok(ExecutionResult::Continue)
            }
            0x02 => {
                let addr = ops[0] as u32 + ops[1] as u32;
                self.engine.memory.write_byte(addr, ops[2] as u8)?;
                Ok(ExecutionResult::Continue)
            }
            0x03 => {
                object::put_property(&mut self.engine.memory, &self.engine.header, ops[0], ops[1] as u8, ops[2])?;
                Ok(ExecutionResult::Continue)
            }
            0x04 => self.op_read(inst, ops, io),
            0x05 => {
                let ch = (ops[0] as u8) as char;
                self.print_text(&ch.to_string(), io)?;
                Ok(ExecutionResult::Continue)
            }
            0x06 => {
                self.print_text(&(ops[0] as i16).to_string(), io)?;
                Ok(ExecutionResult::Continue)
            }
            0x07 => {
                let v = self.rand.random(ops[0] as i16);
                self.store(inst, v)?;
                Ok(ExecutionResult::Continue)
            }
            0x08 => {
                self.engine.push(ops[0]);
                Ok(ExecutionResult::Continue)
            }
            0x09 => {
                let v = self.engine.pop()?;
                let var_num = ops[0] as u8;
                self.engine.write_variable(var_num, v)?;
                Ok(ExecutionResult::Continue)
            }
            0x0A => {
                io.dispatch(IoCommand::SplitWindow { lines: ops[0] })?;
                Ok(ExecutionResult::Continue)
            }
            0x0B => {
                io.dispatch(IoCommand::SetWindow { window: ops[0] as u8 })?;
                Ok(ExecutionResult::Continue)
            }
            0x0C => {
                let store_var = inst.store_var;
                self.do_call(ops[0], &ops[1..], store_var)
            }
            0x0D => {
                io.dispatch(IoCommand::EraseWindow { window: ops[0] as i16 })?;
                Ok(ExecutionResult::Continue)
            }
            0x0E => {
                io.dispatch(IoCommand::EraseLine)?;
                Ok(ExecutionResult::Continue)
            }
            0x0F => {
                io.dispatch(IoCommand::SetCursor { line: ops[0], column: ops[1] })?;
                Ok(ExecutionResult::Continue)
            }
            0x10 => {
                if let IoReply::Cursor(Cursor { line, column }) = io.dispatch(IoCommand::GetCursor)? {
                    self.engine.memory.write_word(ops[0] as u32, line)?;
                    self.engine.memory.write_word(ops[0] as u32 + 2, column)?;
                }
                Ok(ExecutionResult::Continue)
            }
            0x11 => {
                let styles = decode_text_style(ops[0]);
                io.dispatch(IoCommand::SetTextStyle { styles })?;
                Ok(ExecutionResult::Continue)
            }
            0x12 => {
                io.dispatch(IoCommand::BufferMode { buffered: ops[0] != 0 })?;
                Ok(ExecutionResult::Continue)
            }
            0x13 => {
                let stream = ops[0] as i16;
                let table = ops.get(1).map(|&w| w as u32);
                if stream == -3 {
                    self.streams.pop_memory_stream();
                } else {
                    self.streams.set_stream(stream, stream > 0, table)?;
                }
                Ok(ExecutionResult::Continue)
            }
            0x14 => {
                let stream = if ops[0] == 0 { InputStream::Keyboard } else { InputStream::Script };
                io.dispatch(IoCommand::InputStream { stream })?;
                Ok(ExecutionResult::Continue)
            }
            0x15 => {
                let number = ops[0];
                let effect = *ops.get(1).unwrap_or(&2);
                let volume = *ops.get(2).unwrap_or(&8) as u8;
                io.dispatch(IoCommand::SoundEffect { number, effect, volume })?;
                Ok(ExecutionResult::Continue)
            }
            0x16 => self.op_read_char(inst, ops, io),
            0x17 => self.op_scan_table(inst, ops),
            0x18 => {
                self.store(inst, !ops[0])?;
                Ok(ExecutionResult::Continue)
            }
            0x19 => self.do_call(ops[0], &ops[1..], None),
            0x1A => self.do_call(ops[0], &ops[1..], None),
            0x1B => self.op_tokenise(ops),
            0x1C => self.op_encode_text(ops),
            0x1D => self.op_copy_table(ops),
            0x1E => Ok(ExecutionResult::Continue), // print_table: layout-dependent, stubbed
            0x1F => {
                let expected = self.engine.stacks.current_frame().map(|f| f.args_passed).unwrap_or(0);
                self.do_branch(inst, (ops[0] as u8) <= expected)
            }
            other => Err(ZError::UnsupportedOpcode { pc: inst.addr, opcode: other, form: "VAR" }),
        }
    }

    /// `sread`/`aread` (Standard §15/§10): suspends the interpreter. The
    /// caller drives it forward with `submit_line_input` (pump mode) or
    /// `run`'s own synchronous resolution (classic mode) — this function
    /// never talks to the provider itself.
    fn op_read(&mut self, inst: &Instruction, ops: &[u16], _io: &mut dyn IoProvider) -> ZResult<ExecutionResult> {
        let text_buffer = ops[0] as u32;
        let parse_buffer = *ops.get(1).unwrap_or(&0) as u32;
        let store_var = if self.engine.header.version <= 3 { None } else { inst.store_var };
        self.pending_input = Some(PendingInput::Line { text_buffer, parse_buffer, store_var });
        Ok(ExecutionResult::Continue)
    }

    /// `read_char` (Standard §15, V4+): suspends the interpreter; see `op_read`.
    fn op_read_char(&mut self, inst: &Instruction, _ops: &[u16], _io: &mut dyn IoProvider) -> ZResult<ExecutionResult> {
        self.pending_input = Some(PendingInput::Char { store_var: inst.store_var });
        Ok(ExecutionResult::Continue)
    }

    fn op_tokenise(&mut self, ops: &[u16]) -> ZResult<ExecutionResult> {
        let text_buffer = ops[0] as u32;
        let parse_buffer = ops[1] as u32;
        let dict_addr = ops.get(2).map(|&w| w as u32).unwrap_or(self.engine.header.dictionary_addr as u32);
        let skip_unrecognized = ops.get(3).map(|&w| w != 0).unwrap_or(false);

        let version = self.engine.header.version;
        let text_start = if version <= 4 { text_buffer + 1 } else { text_buffer + 2 };
        let len = if version <= 4 {
            let mut n = 0u32;
            while self.engine.memory.read_byte(text_start + n)? != 0 {
                n += 1;
            }
            n
        } else {
            self.engine.memory.read_byte(text_buffer + 1)? as u32
        };
        let mut text = String::new();
        for i in 0..len {
            text.push(self.engine.memory.read_byte(text_start + i)? as char);
        }

        let sep = dictionary::read_dictionary_header(&self.engine.memory, dict_addr)?.separators;
        let tokens = dictionary::tokenise_text(&text, &sep);
        dictionary::write_parse_buffer(
            &mut self.engine.memory,
            &self.engine.header,
            dict_addr,
            parse_buffer,
            &tokens,
            skip_unrecognized,
        )?;
        Ok(ExecutionResult::Continue)
    }

    fn op_encode_text(&mut self, ops: &[u16]) -> ZResult<ExecutionResult> {
        let zscii_text = ops[0] as u32;
        let length = ops[1] as u32;
        let from = ops[2] as u32;
        let coded_buf = ops[3] as u32;
        let mut s = String::new();
        for i in 0..length {
            s.push(self.engine.memory.read_byte(zscii_text + from + i)? as char);
        }
        let words = zstring::encode_input(&s, if self.engine.header.version <= 3 { 2 } else { 3 });
        for (i, w) in words.iter().enumerate() {
            self.engine.memory.write_word(coded_buf + i as u32 * 2, *w)?;
        }
        Ok(ExecutionResult::Continue)
    }

    fn op_copy_table(&mut self, ops: &[u16]) -> ZResult<ExecutionResult> {
        let first = ops[0] as u32;
        let second = ops[1] as u32;
        let size = ops[2] as i16;
        if second == 0 {
            for i in 0..size.unsigned_abs() as u32 {
                self.engine.memory.write_byte(first + i, 0)?;
            }
            return Ok(ExecutionResult::Continue);
        }
        let len = size.unsigned_abs() as u32;
        if size < 0 || first > second {
            for i in 0..len {
                let b = self.engine.memory.read_byte(first + i)?;
                self.engine.memory.write_byte(second + i, b)?;
            }
        } else {
            for i in (0..len).rev() {
                let b = self.engine.memory.read_byte(first + i)?;
                self.engine.memory.write_byte(second + i, b)?;
            }
        }
        Ok(ExecutionResult::Continue)
    }

    fn op_scan_table(&mut self, inst: &Instruction, ops: &[u16]) -> ZResult<ExecutionResult> {
        let x = ops[0];
        let table = ops[1] as u32;
        let len = ops[2];
        let form = *ops.get(3).unwrap_or(&0x82);
        let field_len = (form & 0x7F).max(1) as u32;
        let is_word = form & 0x80 != 0;
        let mut found = 0u32;
        for i in 0..len as u32 {
            let addr = table + i * field_len;
            let value = if is_word { self.engine.memory.read_word(addr)? } else { self.engine.memory.read_byte(addr)? as u16 };
            if value == x {
                found = addr;
                break;
            }
        }
        self.store(inst, found as u16)?;
        self.do_branch(inst, found != 0)
    }

    fn execute_ext(&mut self, inst: &Instruction, ops: &[u16], io: &mut dyn IoProvider) -> ZResult<ExecutionResult> {
        match inst.ext_opcode.unwrap_or(0) {
            0x00 => self.op_save(inst, io),
            0x01 => self.op_restore(inst, io),
            0x02 => {
                let v = ops[0] as i16;
                let shift = ops[1] as i16;
                let result = if shift >= 0 { (v as u16).wrapping_shl(shift as u32) } else { (v as u16).wrapping_shr((-shift) as u32) };
                self.store(inst, result)?;
                Ok(ExecutionResult::Continue)
            }
            0x03 => {
                let v = ops[0] as i16;
                let shift = ops[1] as i16;
                let result = if shift >= 0 { v.wrapping_shl(shift as u32) } else { v.wrapping_shr((-shift) as u32) };
                self.store(inst, result as u16)?;
                Ok(ExecutionResult::Continue)
            }
            0x04 => {
                // set_font: unsupported fonts beyond 1 (normal) and 4 (fixed
                // pitch) report "not supported" by returning 0 (see
                // DESIGN.md Open Questions on the return-0 ambiguity).
                let supported = matches!(ops[0], 1 | 4);
                self.store(inst, if supported { 1 } else { 0 })?;
                Ok(ExecutionResult::Continue)
            }
            0x09 => {
                // save_undo: undo slots are not implemented; -1 means "not supported".
                self.store(inst, (-1i16) as u16)?;
                Ok(ExecutionResult::Continue)
            }
            0x0A => {
                self.store(inst, 0)?;
                Ok(ExecutionResult::Continue)
            }
            0x0B => {
                let code = ops[0];
                let ch = zscii_unicode_print(code);
                self.print_text(&ch.to_string(), io)?;
                Ok(ExecutionResult::Continue)
            }
            0x0C => {
                let supported = (32..=126).contains(&ops[0]) || (155..=223).contains(&ops[0]);
                self.store(inst, if supported { 1 } else { 0 })?;
                Ok(ExecutionResult::Continue)
            }
            other => Err(ZError::UnsupportedOpcode { pc: inst.addr, opcode: other, form: "EXT" }),
        }
    }
}

fn decode_text_style(bits: u16) -> Vec<TextStyle> {
    if bits == 0 {
        return vec![TextStyle::Roman];
    }
    let mut styles = Vec::new();
    if bits & 1 != 0 {
        styles.push(TextStyle::Reverse);
    }
    if bits & 2 != 0 {
        styles.push(TextStyle::Bold);
    }
    if bits & 4 != 0 {
        styles.push(TextStyle::Italic);
    }
    if bits & 8 != 0 {
        styles.push(TextStyle::FixedPitch);
    }
    styles
}

fn zscii_unicode_print(code: u16) -> char {
    char::from_u32(code as u32).unwrap_or('?')
}

//! Text assembler for ACE bytecode
//!
//! One instruction per line. `;` starts a comment, `name:` defines a label,
//! operands are decimal or `0x` hex, and `jmp`/`jmpif`/`call` accept a label
//! in place of an absolute offset. `.byte a, b, ...` emits raw bytes.
//!
//! ```text
//! start:  push 10
//!         push 20
//!         add
//!         halt
//! ```

use std::collections::BTreeMap;

use crate::bytecode::Instruction;
use crate::opcode::Opcode;
use crate::{Error, Result};

/// One parsed source line, before label resolution
#[derive(Debug, Clone, PartialEq)]
enum Item {
    Insn { opcode: Opcode, operand: Option<Operand> },
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Number(u64),
    Label(String),
}

impl Item {
    fn len(&self) -> usize {
        match self {
            Item::Insn { opcode, .. } => opcode.encoded_len(),
            Item::Bytes(bytes) => bytes.len(),
        }
    }
}

/// Assemble source text into bytecode.
///
/// The output is not validated; run it through
/// [`crate::validator::validate`] before execution.
pub fn assemble(source: &str) -> Result<Vec<u8>> {
    let mut items: Vec<(usize, Item)> = Vec::new();
    let mut labels: BTreeMap<String, usize> = BTreeMap::new();
    let mut offset = 0usize;

    // Pass 1: parse lines and lay out offsets
    for (idx, raw) in source.lines().enumerate() {
        let line_no = idx + 1;
        let mut line = raw.split(';').next().unwrap_or("").trim();

        while let Some((head, rest)) = split_label(line) {
            if !is_identifier(head) {
                return Err(asm_error(line_no, format!("invalid label '{}'", head)));
            }
            if labels.insert(head.to_string(), offset).is_some() {
                return Err(asm_error(line_no, format!("duplicate label '{}'", head)));
            }
            line = rest.trim();
        }
        if line.is_empty() {
            continue;
        }

        let item = parse_item(line, line_no)?;
        offset += item.len();
        items.push((line_no, item));
    }

    // Pass 2: resolve labels and encode
    let mut out = Vec::with_capacity(offset);
    for (line_no, item) in items {
        match item {
            Item::Bytes(bytes) => out.extend_from_slice(&bytes),
            Item::Insn { opcode, operand } => {
                let insn = build_instruction(opcode, operand, &labels, line_no)?;
                insn.encode_into(&mut out);
            }
        }
    }
    Ok(out)
}

fn split_label(line: &str) -> Option<(&str, &str)> {
    let colon = line.find(':')?;
    let head = line[..colon].trim();
    if head.contains(char::is_whitespace) {
        return None;
    }
    Some((head, &line[colon + 1..]))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_item(line: &str, line_no: usize) -> Result<Item> {
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((h, r)) => (h, r.trim()),
        None => (line, ""),
    };

    if head.eq_ignore_ascii_case(".byte") {
        let bytes = rest
            .split(',')
            .map(|tok| {
                let value = parse_number(tok.trim())
                    .ok_or_else(|| asm_error(line_no, format!("invalid byte '{}'", tok.trim())))?;
                u8::try_from(value)
                    .map_err(|_| asm_error(line_no, format!("byte {} out of range", value)))
            })
            .collect::<Result<Vec<u8>>>()?;
        return Ok(Item::Bytes(bytes));
    }

    let opcode = Opcode::from_mnemonic(head)
        .ok_or_else(|| asm_error(line_no, format!("unknown mnemonic '{}'", head)))?;

    let operand = if rest.is_empty() {
        None
    } else if let Some(n) = parse_number(rest) {
        Some(Operand::Number(n))
    } else if is_identifier(rest) {
        Some(Operand::Label(rest.to_string()))
    } else {
        return Err(asm_error(line_no, format!("invalid operand '{}'", rest)));
    };

    Ok(Item::Insn { opcode, operand })
}

fn parse_number(tok: &str) -> Option<u64> {
    let tok = tok.replace('_', "");
    if let Some(hex) = tok.strip_prefix("0x").or_else(|| tok.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        tok.parse::<u64>().ok()
    }
}

fn build_instruction(
    opcode: Opcode,
    operand: Option<Operand>,
    labels: &BTreeMap<String, usize>,
    line_no: usize,
) -> Result<Instruction> {
    match opcode {
        Opcode::Push => match operand {
            Some(Operand::Number(n)) => Ok(Instruction::Push(n)),
            Some(Operand::Label(name)) => {
                let target = resolve(&name, labels, line_no)?;
                Ok(Instruction::Push(target as u64))
            }
            None => Err(asm_error(line_no, "push requires an operand".into())),
        },
        Opcode::Jmp | Opcode::JmpIf | Opcode::Call => {
            let target = match operand {
                Some(Operand::Number(n)) => n,
                Some(Operand::Label(name)) => resolve(&name, labels, line_no)? as u64,
                None => {
                    return Err(asm_error(
                        line_no,
                        format!("{} requires a target", opcode),
                    ))
                }
            };
            let target = u32::try_from(target).map_err(|_| {
                asm_error(line_no, format!("target {} does not fit in 4 bytes", target))
            })?;
            Ok(match opcode {
                Opcode::Jmp => Instruction::Jmp(target),
                Opcode::JmpIf => Instruction::JmpIf(target),
                _ => Instruction::Call(target),
            })
        }
        other => {
            if operand.is_some() {
                return Err(asm_error(
                    line_no,
                    format!("{} takes no operand", other),
                ));
            }
            Instruction::bare(other)
                .ok_or_else(|| asm_error(line_no, format!("{} requires an operand", other)))
        }
    }
}

fn resolve(name: &str, labels: &BTreeMap<String, usize>, line_no: usize) -> Result<usize> {
    labels
        .get(name)
        .copied()
        .ok_or_else(|| asm_error(line_no, format!("undefined label '{}'", name)))
}

fn asm_error(line_no: usize, msg: String) -> Error {
    Error::InvalidContract(format!("line {}: {}", line_no, msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{disassemble, encode, format_listing};

    #[test]
    fn test_assemble_sample_add() {
        let code = assemble("push 10\npush 20\nadd\nhalt\n").unwrap();
        let expected = encode(&[
            Instruction::Push(10),
            Instruction::Push(20),
            Instruction::Add,
            Instruction::Halt,
        ]);
        assert_eq!(code, expected);
    }

    #[test]
    fn test_labels_resolve_forward_and_backward() {
        let src = "
            start:  push 1
                    jmpif end      ; forward
                    jmp start      ; backward
            end:    halt
        ";
        let code = assemble(src).unwrap();
        let listing = disassemble(&code).unwrap();
        assert_eq!(listing[1].1, Instruction::JmpIf(19));
        assert_eq!(listing[2].1, Instruction::Jmp(0));
        assert_eq!(listing[3], (19, Instruction::Halt));
    }

    #[test]
    fn test_hex_operands_and_case() {
        let code = assemble("PUSH 0xff\nHalt").unwrap();
        assert_eq!(code[0], 0x01);
        assert_eq!(code[1], 0xff);
        assert_eq!(*code.last().unwrap(), 0xFF);
    }

    #[test]
    fn test_byte_directive() {
        let code = assemble(".byte 0x42, 7\nhalt").unwrap();
        assert_eq!(code, vec![0x42, 7, 0xFF]);
    }

    #[test]
    fn test_errors_report_line_numbers() {
        let err = assemble("push 1\nfrobnicate\nhalt").unwrap_err();
        assert_eq!(
            err,
            Error::InvalidContract("line 2: unknown mnemonic 'frobnicate'".into())
        );

        let err = assemble("jmp nowhere\nhalt").unwrap_err();
        assert!(err.to_string().contains("undefined label 'nowhere'"));

        let err = assemble("add 3\nhalt").unwrap_err();
        assert!(err.to_string().contains("takes no operand"));

        let err = assemble("a:\na:\nhalt").unwrap_err();
        assert!(err.to_string().contains("duplicate label"));
    }

    #[test]
    fn test_jump_target_must_fit_u32() {
        let err = assemble("jmp 0x100000000\nhalt").unwrap_err();
        assert!(err.to_string().contains("does not fit"));
    }

    #[test]
    fn test_listing_reassembles_identically() {
        let src = "
            loop:   push 3
                    push 1
                    sub
                    call sub1
                    jmp loop
            sub1:   ret
                    halt
        ";
        let code = assemble(src).unwrap();
        let listing = format_listing(&disassemble(&code).unwrap());
        assert_eq!(assemble(&listing).unwrap(), code);
    }
}

//! The handful of script forms the asset layer reads: data carriers and
//! witness-program outputs.

use crate::witness::WitnessAddress;

pub const OP_0: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1: u8 = 0x51;
pub const OP_16: u8 = 0x60;
pub const OP_RETURN: u8 = 0x6a;

pub const MIN_WITNESS_PROGRAM_LEN: usize = 2;
pub const MAX_WITNESS_PROGRAM_LEN: usize = 40;

pub fn is_op_return(script: &[u8]) -> bool {
    script.first() == Some(&OP_RETURN)
}

/// Concatenated data of all pushes following `OP_RETURN`. Returns `None` for
/// other scripts or when a push is truncated or a non-push opcode follows.
pub fn op_return_data(script: &[u8]) -> Option<Vec<u8>> {
    if !is_op_return(script) {
        return None;
    }
    let mut data = Vec::new();
    let mut cursor = 1usize;
    while cursor < script.len() {
        let (push, next) = read_push(script, cursor)?;
        data.extend_from_slice(push);
        cursor = next;
    }
    Some(data)
}

fn read_push(script: &[u8], cursor: usize) -> Option<(&[u8], usize)> {
    let opcode = *script.get(cursor)?;
    let (len, start) = match opcode {
        0x01..=0x4b => (opcode as usize, cursor + 1),
        OP_PUSHDATA1 => (*script.get(cursor + 1)? as usize, cursor + 2),
        OP_PUSHDATA2 => {
            let bytes = script.get(cursor + 1..cursor + 3)?;
            (u16::from_le_bytes([bytes[0], bytes[1]]) as usize, cursor + 3)
        }
        OP_PUSHDATA4 => {
            let bytes = script.get(cursor + 1..cursor + 5)?;
            let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            (usize::try_from(len).ok()?, cursor + 5)
        }
        _ => return None,
    };
    let end = start.checked_add(len)?;
    Some((script.get(start..end)?, end))
}

pub fn push_data(script: &mut Vec<u8>, data: &[u8]) {
    let len = data.len();
    if len <= 0x4b {
        script.push(len as u8);
    } else if len <= 0xff {
        script.push(OP_PUSHDATA1);
        script.push(len as u8);
    } else if len <= 0xffff {
        script.push(OP_PUSHDATA2);
        script.extend_from_slice(&(len as u16).to_le_bytes());
    } else {
        script.push(OP_PUSHDATA4);
        script.extend_from_slice(&(len as u32).to_le_bytes());
    }
    script.extend_from_slice(data);
}

pub fn op_return_script(data: &[u8]) -> Vec<u8> {
    let mut script = vec![OP_RETURN];
    push_data(&mut script, data);
    script
}

/// Decodes `<version opcode> <program push>`; the program length must be 2..=40.
pub fn witness_program(script: &[u8]) -> Option<WitnessAddress> {
    if script.len() < 4 || script.len() > MAX_WITNESS_PROGRAM_LEN + 2 {
        return None;
    }
    let version = match script[0] {
        OP_0 => 0u8,
        op @ OP_1..=OP_16 => op - OP_1 + 1,
        _ => return None,
    };
    let len = script[1] as usize;
    if len + 2 != script.len() || !(MIN_WITNESS_PROGRAM_LEN..=MAX_WITNESS_PROGRAM_LEN).contains(&len)
    {
        return None;
    }
    Some(WitnessAddress::new(version, script[2..].to_vec()))
}

pub fn witness_program_script(address: &WitnessAddress) -> Vec<u8> {
    let version_op = if address.version == 0 {
        OP_0
    } else {
        OP_1 + address.version - 1
    };
    let mut script = vec![version_op];
    push_data(&mut script, &address.program);
    script
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_return_concatenates_pushes() {
        let mut script = op_return_script(&[1, 2, 3]);
        push_data(&mut script, &[0xaa; 300]);
        let data = op_return_data(&script).expect("data");
        assert_eq!(data.len(), 303);
        assert_eq!(&data[..3], &[1, 2, 3]);
    }

    #[test]
    fn op_return_rejects_truncated_push() {
        let script = vec![OP_RETURN, 0x05, 1, 2];
        assert!(op_return_data(&script).is_none());
        assert!(op_return_data(&[0x51]).is_none());
    }

    #[test]
    fn witness_program_detection() {
        let address = WitnessAddress::new(0, vec![0x11; 20]);
        let script = witness_program_script(&address);
        assert_eq!(script[0], OP_0);
        assert_eq!(witness_program(&script), Some(address));

        let taproot = WitnessAddress::new(1, vec![0x22; 32]);
        assert_eq!(witness_program(&witness_program_script(&taproot)), Some(taproot));

        assert!(witness_program(&[OP_0, 0x01, 0x00]).is_none());
        assert!(witness_program(&[0x76, 0x02, 0x00, 0x00]).is_none());
    }
}

/// H.264 NAL unit type, the low 5 bits of the NAL header byte (ITU-T H.264 §7.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NalUnitType {
    Unspecified,
    CodedSliceNonIdr,
    CodedSliceDataPartitionA,
    CodedSliceDataPartitionB,
    CodedSliceDataPartitionC,
    CodedSliceIdr,
    Sei,
    Sps,
    Pps,
    Aud,
    EndOfSequence,
    EndOfStream,
    Filler,
    SpsExt,
    StapA,
    StapB,
    Mtap16,
    Mtap24,
    FuA,
    FuB,
    Reserved(u8),
}

impl From<u8> for NalUnitType {
    fn from(b: u8) -> Self {
        match b & 0x1F {
            0 => NalUnitType::Unspecified,
            1 => NalUnitType::CodedSliceNonIdr,
            2 => NalUnitType::CodedSliceDataPartitionA,
            3 => NalUnitType::CodedSliceDataPartitionB,
            4 => NalUnitType::CodedSliceDataPartitionC,
            5 => NalUnitType::CodedSliceIdr,
            6 => NalUnitType::Sei,
            7 => NalUnitType::Sps,
            8 => NalUnitType::Pps,
            9 => NalUnitType::Aud,
            10 => NalUnitType::EndOfSequence,
            11 => NalUnitType::EndOfStream,
            12 => NalUnitType::Filler,
            13 => NalUnitType::SpsExt,
            24 => NalUnitType::StapA,
            25 => NalUnitType::StapB,
            26 => NalUnitType::Mtap16,
            27 => NalUnitType::Mtap24,
            28 => NalUnitType::FuA,
            29 => NalUnitType::FuB,
            other => NalUnitType::Reserved(other),
        }
    }
}

impl NalUnitType {
    /// NAL types not reassembled by this depacketizer (RFC 6184 modes we don't implement).
    pub fn is_unsupported_aggregation(self) -> bool {
        matches!(
            self,
            NalUnitType::StapB | NalUnitType::Mtap16 | NalUnitType::Mtap24 | NalUnitType::FuB
        )
    }
}

pub const ANNEX_B_START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

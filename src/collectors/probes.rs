use super::{BatteryState, SampleError};
use crate::calculators::CoreTicks;

/// Used bytes from `vm_stat`: active + wired + compressor-occupied pages.
pub fn parse_vm_stat(text: &str) -> Result<u64, SampleError> {
    let page_size = text
        .lines()
        .next()
        .and_then(|header| {
            let rest = header.split("page size of").nth(1)?;
            rest.split_whitespace().next()?.parse::<u64>().ok()
        })
        .ok_or_else(|| SampleError::Parse {
            what: "vm_stat",
            detail: "нет размера страницы".to_string(),
        })?;

    let mut active = None;
    let mut wired = None;
    let mut compressed = None;
    for line in text.lines().skip(1) {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let Ok(pages) = value.trim().trim_end_matches('.').parse::<u64>() else {
            continue;
        };
        match key.trim() {
            "Pages active" => active = Some(pages),
            "Pages wired down" => wired = Some(pages),
            "Pages occupied by compressor" => compressed = Some(pages),
            _ => {}
        }
    }

    match (active, wired) {
        (Some(active), Some(wired)) => {
            let pages = active + wired + compressed.unwrap_or(0);
            Ok(pages.saturating_mul(page_size))
        }
        _ => Err(SampleError::Parse {
            what: "vm_stat",
            detail: "нет счётчиков active/wired".to_string(),
        }),
    }
}

pub fn parse_pmset_batt(text: &str) -> BatteryState {
    let on_ac = text
        .lines()
        .next()
        .map(|l| l.contains("'AC Power'"))
        .unwrap_or(false);

    let percentage = text
        .lines()
        .filter(|l| l.contains("InternalBattery"))
        .find_map(|l| {
            l.split(|c: char| c.is_whitespace() || c == ';')
                .find_map(|token| token.strip_suffix('%'))
                .and_then(|digits| digits.parse::<u16>().ok())
        });

    match percentage {
        Some(p) => BatteryState {
            percentage: Some(p.min(100) as u8),
            is_charging: on_ac,
            is_present: true,
        },
        None => BatteryState::ABSENT,
    }
}

pub fn parse_proc_stat(text: &str) -> Result<Vec<CoreTicks>, SampleError> {
    let mut cores = Vec::new();
    for line in text.lines() {
        let mut fields = line.split_whitespace();
        let Some(label) = fields.next() else {
            continue;
        };
        let is_core = label
            .strip_prefix("cpu")
            .map(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false);
        if !is_core {
            continue;
        }
        let values: Vec<u64> = fields.take(4).filter_map(|v| v.parse().ok()).collect();
        if values.len() < 4 {
            return Err(SampleError::Parse {
                what: "/proc/stat",
                detail: format!("строка '{label}' короче ожидаемого"),
            });
        }
        cores.push(CoreTicks {
            user: values[0],
            nice: values[1],
            system: values[2],
            idle: values[3],
        });
    }
    if cores.is_empty() {
        return Err(SampleError::Parse {
            what: "/proc/stat",
            detail: "нет строк cpuN".to_string(),
        });
    }
    Ok(cores)
}

pub fn parse_power_supply(capacity: &str, status: &str) -> BatteryState {
    let Ok(capacity) = capacity.trim().parse::<u16>() else {
        return BatteryState::ABSENT;
    };
    let status = status.trim();
    BatteryState {
        percentage: Some(capacity.min(100) as u8),
        is_charging: status.eq_ignore_ascii_case("charging") || status.eq_ignore_ascii_case("full"),
        is_present: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VM_STAT: &str = "Mach Virtual Memory Statistics: (page size of 16384 bytes)
Pages free:                               10000.
Pages active:                            200000.
Pages inactive:                          190000.
Pages speculative:                         4000.
Pages throttled:                              0.
Pages wired down:                        100000.
Pages purgeable:                           3000.
\"Translation faults\":                  123456789.
Pages occupied by compressor:             50000.
";

    #[test]
    fn vm_stat_sums_active_wired_compressed() {
        let used = parse_vm_stat(VM_STAT).expect("vm_stat должен разбираться");
        assert_eq!(used, (200_000 + 100_000 + 50_000) * 16_384);
    }

    #[test]
    fn vm_stat_without_page_size_is_error() {
        assert!(parse_vm_stat("Pages active: 10.\n").is_err());
    }

    #[test]
    fn pmset_on_ac_is_charging() {
        let text = "Now drawing from 'AC Power'
 -InternalBattery-0 (id=4653155)\t87%; charging; 0:45 remaining present: true
";
        assert_eq!(
            parse_pmset_batt(text),
            BatteryState {
                percentage: Some(87),
                is_charging: true,
                is_present: true,
            }
        );
    }

    #[test]
    fn pmset_on_battery() {
        let text = "Now drawing from 'Battery Power'
 -InternalBattery-0 (id=4653155)\t42%; discharging; 3:12 remaining present: true
";
        let state = parse_pmset_batt(text);
        assert_eq!(state.percentage, Some(42));
        assert!(!state.is_charging);
        assert!(state.is_present);
    }

    #[test]
    fn pmset_desktop_has_no_battery() {
        assert_eq!(
            parse_pmset_batt("Now drawing from 'AC Power'\n"),
            BatteryState::ABSENT
        );
    }

    #[test]
    fn proc_stat_reads_per_core_lines_only() {
        let text = "cpu  400 20 300 9000 10 0 5 0 0 0
cpu0 100 5 80 4500 5 0 2 0 0 0
cpu1 300 15 220 4500 5 0 3 0 0 0
intr 12345
ctxt 999
";
        let cores = parse_proc_stat(text).expect("должен разобраться");
        assert_eq!(cores.len(), 2);
        assert_eq!(
            cores[0],
            CoreTicks {
                user: 100,
                nice: 5,
                system: 80,
                idle: 4500,
            }
        );
        assert_eq!(cores[1].system, 220);
    }

    #[test]
    fn proc_stat_without_cores_is_error() {
        assert!(parse_proc_stat("cpu 1 2 3 4\n").is_err());
    }

    #[test]
    fn power_supply_status() {
        let s = parse_power_supply("76\n", "Charging\n");
        assert_eq!(s.percentage, Some(76));
        assert!(s.is_charging);
        assert!(!parse_power_supply("76", "Discharging").is_charging);
        assert_eq!(parse_power_supply("", "Unknown"), BatteryState::ABSENT);
    }
}

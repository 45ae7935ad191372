#![allow(deprecated)]

use super::SampleError;
use crate::calculators::CoreTicks;

pub fn host_cpu_ticks() -> Result<Vec<CoreTicks>, SampleError> {
    let mut cpu_count: libc::natural_t = 0;
    let mut info: libc::processor_info_array_t = std::ptr::null_mut();
    let mut info_count: libc::mach_msg_type_number_t = 0;

    // SAFETY: all out-pointers reference live locals; the kernel allocates `info`.
    let kr = unsafe {
        libc::host_processor_info(
            libc::mach_host_self(),
            libc::PROCESSOR_CPU_LOAD_INFO,
            &mut cpu_count,
            &mut info,
            &mut info_count,
        )
    };
    if kr != libc::KERN_SUCCESS || info.is_null() {
        return Err(SampleError::Parse {
            what: "host_processor_info",
            detail: format!("kern_return_t = {kr}"),
        });
    }

    let stride = libc::CPU_STATE_MAX as usize;
    let cores = cpu_count as usize;
    let len = info_count as usize;

    let result = if len < cores * stride {
        Err(SampleError::Parse {
            what: "host_processor_info",
            detail: format!("массив из {len} значений для {cores} ядер"),
        })
    } else {
        // SAFETY: the kernel returned `info_count` integers starting at `info`.
        let raw = unsafe { std::slice::from_raw_parts(info, len) };
        // Tick counters are unsigned 32-bit values stored as integer_t.
        let at = |core: usize, state: libc::c_int| raw[core * stride + state as usize] as u32 as u64;
        Ok((0..cores)
            .map(|i| CoreTicks {
                user: at(i, libc::CPU_STATE_USER),
                system: at(i, libc::CPU_STATE_SYSTEM),
                nice: at(i, libc::CPU_STATE_NICE),
                idle: at(i, libc::CPU_STATE_IDLE),
            })
            .collect())
    };

    // SAFETY: `info` was allocated by the kernel in our task with `info_count` integers.
    unsafe {
        libc::vm_deallocate(
            libc::mach_task_self(),
            info as libc::vm_address_t,
            (len * std::mem::size_of::<libc::integer_t>()) as libc::vm_size_t,
        );
    }

    result
}
